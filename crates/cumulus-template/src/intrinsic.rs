//! Constructors for CloudFormation intrinsic functions.

use serde_json::{Value, json};

/// `{ "Ref": name }`
pub fn reference(name: &str) -> Value {
  json!({ "Ref": name })
}

/// `{ "Fn::GetAtt": [resource, attribute] }`
pub fn get_att(resource: &str, attribute: &str) -> Value {
  json!({ "Fn::GetAtt": [resource, attribute] })
}

/// `{ "Fn::Sub": [template, variables] }`
pub fn sub(template: impl Into<Value>, variables: Value) -> Value {
  json!({ "Fn::Sub": [template.into(), variables] })
}

/// `{ "Fn::Equals": [left, right] }`
pub fn equals(left: Value, right: Value) -> Value {
  json!({ "Fn::Equals": [left, right] })
}

/// `{ "Fn::Join": [delimiter, parts] }`
pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
  json!({ "Fn::Join": [delimiter, parts] })
}
