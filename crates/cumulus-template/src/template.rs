use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TemplateError;

/// The only CloudFormation template format version.
pub const FORMAT_VERSION: &str = "2010-09-09";

/// A declarative resource tree, serialized as a CloudFormation template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
  #[serde(
    rename = "AWSTemplateFormatVersion",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub format_version: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub parameters: BTreeMap<String, Parameter>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub conditions: BTreeMap<String, Value>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub resources: BTreeMap<String, Resource>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub outputs: BTreeMap<String, Output>,
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
  #[serde(rename = "Type")]
  pub parameter_type: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

impl Parameter {
  /// A `String` parameter with no default.
  pub fn string() -> Self {
    Self {
      parameter_type: "String".to_string(),
      default: None,
      description: None,
      extra: BTreeMap::new(),
    }
  }

  pub fn with_default(mut self, default: impl Into<Value>) -> Self {
    self.default = Some(default.into());
    self
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
  #[serde(rename = "Type")]
  pub resource_type: String,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub properties: BTreeMap<String, Value>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub depends_on: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub condition: Option<String>,
  /// Keys without a dedicated field (`Metadata`, `DeletionPolicy`, ...).
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

impl Resource {
  pub fn new(resource_type: impl Into<String>) -> Self {
    Self {
      resource_type: resource_type.into(),
      properties: BTreeMap::new(),
      depends_on: Vec::new(),
      condition: None,
      extra: BTreeMap::new(),
    }
  }

  pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.properties.insert(name.into(), value.into());
    self
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
  pub value: Value,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub condition: Option<String>,
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

impl Output {
  pub fn new(value: Value) -> Self {
    Self {
      value,
      description: None,
      condition: None,
      extra: BTreeMap::new(),
    }
  }
}

impl Template {
  /// Serialize the template as pretty-printed JSON.
  pub fn to_json_pretty(&self) -> Result<String, TemplateError> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  /// Serialize the template as a JSON value.
  pub fn to_value(&self) -> Result<Value, TemplateError> {
    Ok(serde_json::to_value(self)?)
  }

  /// Merge outputs from another template. Entries in `other` win on conflict.
  pub fn merge_outputs(&mut self, other: Template) {
    self.outputs.extend(other.outputs);
  }
}
