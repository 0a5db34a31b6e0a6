//! User-pool group metadata.
//!
//! Groups are read from `user-pool-group-precedence.json`:
//! ```json
//! [
//!   { "groupName": "Admin", "precedence": 1 },
//!   {
//!     "groupName": "Editors",
//!     "precedence": 2,
//!     "customPolicies": [
//!       {
//!         "PolicyName": "editor-bucket",
//!         "PolicyDocument": {
//!           "Version": "2012-10-17",
//!           "Statement": [
//!             { "Effect": "Allow", "Action": ["s3:*"], "Resource": "arn:aws:s3:::media-${env}/*" }
//!           ]
//!         }
//!       }
//!     ]
//!   }
//! ]
//! ```

use std::path::Path;

use cumulus_template::intrinsic;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::fs;
use tracing::debug;

use crate::error::TransformError;

const ENV_PLACEHOLDER: &str = "${env}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPoolGroup {
  pub group_name: String,
  pub precedence: i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub custom_policies: Option<Vec<Value>>,
}

/// Read the group list. The file must exist.
pub async fn load_groups(path: &Path) -> Result<Vec<UserPoolGroup>, TransformError> {
  if !fs::try_exists(path).await? {
    return Err(TransformError::MissingInput {
      path: path.to_path_buf(),
    });
  }

  let content = fs::read_to_string(path).await?;
  let groups: Option<Vec<UserPoolGroup>> =
    serde_json::from_str(&content).map_err(|e| TransformError::InvalidInput {
      path: path.to_path_buf(),
      source: e,
    })?;

  let mut groups = groups.unwrap_or_default();
  substitute_env(&mut groups);
  debug!(count = groups.len(), "user pool groups loaded");
  Ok(groups)
}

/// Rewrite policy statement resources that mention `${env}` into `Fn::Sub`
/// expressions bound to the `env` parameter.
pub fn substitute_env(groups: &mut [UserPoolGroup]) {
  let policies = groups
    .iter_mut()
    .filter_map(|g| g.custom_policies.as_mut())
    .flatten();

  for policy in policies {
    let Some(statements) = policy
      .pointer_mut("/PolicyDocument/Statement")
      .and_then(Value::as_array_mut)
    else {
      continue;
    };

    for statement in statements {
      if let Some(resource) = statement.get_mut("Resource") {
        substitute_resource(resource);
      }
    }
  }
}

fn substitute_resource(resource: &mut Value) {
  match resource {
    Value::Array(items) => items.iter_mut().for_each(substitute_string),
    other => substitute_string(other),
  }
}

fn substitute_string(value: &mut Value) {
  let replacement = match value.as_str() {
    Some(s) if s.contains(ENV_PLACEHOLDER) => env_sub(s),
    _ => return,
  };
  *value = replacement;
}

fn env_sub(resource: &str) -> Value {
  intrinsic::sub(resource, json!({ "env": intrinsic::reference("env") }))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn group_with_resource(resource: Value) -> UserPoolGroup {
    UserPoolGroup {
      group_name: "Editors".to_string(),
      precedence: 2,
      custom_policies: Some(vec![json!({
        "PolicyName": "editor-bucket",
        "PolicyDocument": {
          "Version": "2012-10-17",
          "Statement": [{ "Effect": "Allow", "Action": ["s3:*"], "Resource": resource }]
        }
      })]),
    }
  }

  fn first_resource(group: &UserPoolGroup) -> &Value {
    &group.custom_policies.as_ref().unwrap()[0]["PolicyDocument"]["Statement"][0]["Resource"]
  }

  #[test]
  fn test_env_string_becomes_sub() {
    let mut groups = vec![group_with_resource(json!("arn:aws:s3:::media-${env}/*"))];

    substitute_env(&mut groups);

    assert_eq!(
      first_resource(&groups[0]),
      &json!({ "Fn::Sub": ["arn:aws:s3:::media-${env}/*", { "env": { "Ref": "env" } }] })
    );
  }

  #[test]
  fn test_plain_resource_is_untouched() {
    let mut groups = vec![group_with_resource(json!("arn:aws:s3:::media/*"))];

    substitute_env(&mut groups);

    assert_eq!(first_resource(&groups[0]), &json!("arn:aws:s3:::media/*"));
  }

  #[test]
  fn test_env_in_resource_list() {
    let mut groups = vec![group_with_resource(json!([
      "arn:aws:s3:::media-${env}",
      "arn:aws:s3:::shared"
    ]))];

    substitute_env(&mut groups);

    assert_eq!(
      first_resource(&groups[0]),
      &json!([
        { "Fn::Sub": ["arn:aws:s3:::media-${env}", { "env": { "Ref": "env" } }] },
        "arn:aws:s3:::shared"
      ])
    );
  }

  #[test]
  fn test_groups_without_policies() {
    let mut groups = vec![UserPoolGroup {
      group_name: "Admin".to_string(),
      precedence: 1,
      custom_policies: None,
    }];

    substitute_env(&mut groups);

    assert!(groups[0].custom_policies.is_none());
  }

  #[tokio::test]
  async fn test_load_groups_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("user-pool-group-precedence.json");

    let err = load_groups(&path).await.unwrap_err();

    assert!(matches!(err, TransformError::MissingInput { .. }));
  }

  #[tokio::test]
  async fn test_load_groups_null_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("user-pool-group-precedence.json");
    std::fs::write(&path, "null").unwrap();

    let groups = load_groups(&path).await.unwrap();

    assert!(groups.is_empty());
  }

  #[tokio::test]
  async fn test_load_groups_invalid_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("user-pool-group-precedence.json");
    std::fs::write(&path, r#"[{ "groupName": "Admin" }]"#).unwrap();

    let err = load_groups(&path).await.unwrap_err();

    assert!(matches!(err, TransformError::InvalidInput { .. }));
  }
}
