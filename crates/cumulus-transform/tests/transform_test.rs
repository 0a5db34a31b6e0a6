//! Integration tests for UserPoolGroupTransform against a project directory.

use std::path::Path;

use cumulus_override::{OverrideError, SandboxConfig};
use cumulus_transform::{ProjectPaths, TransformConfig, TransformError, UserPoolGroupTransform};
use serde_json::{Value, json};

const AUTH_RESOURCE: &str = "cognito1234";

/// Lay out a minimal project with two groups and an identity pool.
fn create_project(with_identity_pool: bool) -> (tempfile::TempDir, ProjectPaths) {
  let dir = tempfile::tempdir().expect("failed to create temp dir");
  let paths = ProjectPaths::from_project_dir(dir.path());

  std::fs::create_dir_all(paths.resource_dir()).unwrap();
  std::fs::write(
    paths.groups_file(),
    json!([
      { "groupName": "Admin", "precedence": 1 },
      {
        "groupName": "Editors",
        "precedence": 2,
        "customPolicies": [{
          "PolicyName": "editor-bucket",
          "PolicyDocument": {
            "Version": "2012-10-17",
            "Statement": [{ "Effect": "Allow", "Action": ["s3:*"], "Resource": "arn:aws:s3:::media-${env}/*" }]
          }
        }]
      }
    ])
    .to_string(),
  )
  .unwrap();

  let cli_inputs = paths.cli_inputs_file(AUTH_RESOURCE);
  std::fs::create_dir_all(cli_inputs.parent().unwrap()).unwrap();
  let cognito_config = if with_identity_pool {
    json!({ "identityPoolName": "testpool" })
  } else {
    json!({})
  };
  std::fs::write(
    &cli_inputs,
    json!({ "version": "1", "cognitoConfig": cognito_config }).to_string(),
  )
  .unwrap();

  (dir, paths)
}

fn write_override(paths: &ProjectPaths, source: &str) {
  std::fs::write(paths.resource_dir().join("override.lua"), source).unwrap();
}

fn transform(paths: &ProjectPaths, timeout_ms: u64) -> UserPoolGroupTransform {
  let mut config = TransformConfig::new(AUTH_RESOURCE, paths.clone());
  config.sandbox = SandboxConfig {
    timeout_ms,
    ..Default::default()
  };
  UserPoolGroupTransform::new(config)
}

fn read_json(path: &Path) -> Value {
  serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_transform_without_override() {
  let (_dir, paths) = create_project(true);

  let template = transform(&paths, 5000).transform().await.unwrap();

  let saved = read_json(&paths.template_file());
  assert_eq!(saved, template.to_value().unwrap());
  assert_eq!(saved["AWSTemplateFormatVersion"], "2010-09-09");
  assert_eq!(saved["Resources"]["AdminGroup"]["Properties"]["GroupName"], "Admin");
  assert_eq!(
    saved["Resources"]["EditorsGroupRole"]["Properties"]["Policies"][0]["PolicyDocument"]["Statement"]
      [0]["Resource"],
    json!({ "Fn::Sub": ["arn:aws:s3:::media-${env}/*", { "env": { "Ref": "env" } }] })
  );
  assert_eq!(
    saved["Outputs"]["EditorsGroupRole"]["Value"],
    json!({ "Fn::GetAtt": ["EditorsGroupRole", "Arn"] })
  );

  assert_eq!(
    read_json(&paths.parameters_file()),
    json!({
      "AuthRoleArn": { "Fn::GetAtt": ["AuthRole", "Arn"] },
      "UnauthRoleArn": { "Fn::GetAtt": ["UnauthRole", "Arn"] }
    })
  );
  assert!(!paths.build_dir().join("override.lua").exists());
}

#[tokio::test]
async fn test_transform_applies_override() {
  let (_dir, paths) = create_project(false);
  write_override(
    &paths,
    r#"
      function override(resources)
        resources.Resources.AdminGroup.Properties.Description = "Administrators"
        resources.Resources.AdminGroup.Properties.Precedence = 10
      end
    "#,
  );

  let template = transform(&paths, 5000).transform().await.unwrap();

  let admin = &template.resources["AdminGroup"];
  assert_eq!(admin.properties["Description"], json!("Administrators"));
  assert_eq!(admin.properties["Precedence"], json!(10));
  assert_eq!(
    read_json(&paths.template_file())["Resources"]["AdminGroup"]["Properties"]["Description"],
    "Administrators"
  );
  assert!(paths.build_dir().join("override.lua").exists());
}

#[tokio::test]
async fn test_noop_override_matches_no_override() {
  let (_dir, paths) = create_project(true);
  let baseline = transform(&paths, 5000).transform().await.unwrap();
  let baseline_json = std::fs::read_to_string(paths.template_file()).unwrap();

  write_override(&paths, "function override(resources) end");
  let overridden = transform(&paths, 5000).transform().await.unwrap();

  assert_eq!(baseline, overridden);
  assert_eq!(
    std::fs::read_to_string(paths.template_file()).unwrap(),
    baseline_json
  );
}

#[tokio::test]
async fn test_failing_override_aborts_before_save() {
  let (_dir, paths) = create_project(false);
  write_override(&paths, "function override(resources) error('bad group') end");

  let err = transform(&paths, 5000).transform().await.unwrap_err();

  match err {
    TransformError::Override(OverrideError::Runtime { message }) => {
      assert!(message.contains("bad group"));
      assert!(!message.contains("stack traceback"));
    }
    other => panic!("expected override runtime error, got {other:?}"),
  }
  assert!(!paths.template_file().exists());
}

#[tokio::test]
async fn test_stuck_override_times_out() {
  let (_dir, paths) = create_project(false);
  write_override(&paths, "function override(resources) while true do end end");

  let err = transform(&paths, 150).transform().await.unwrap_err();

  assert!(matches!(
    err,
    TransformError::Override(OverrideError::Timeout { timeout_ms: 150 })
  ));
  assert!(!paths.template_file().exists());
}

#[tokio::test]
async fn test_override_syntax_error_is_build_failure() {
  let (_dir, paths) = create_project(false);
  write_override(&paths, "function override(resources");

  let err = transform(&paths, 5000).transform().await.unwrap_err();

  assert!(matches!(
    err,
    TransformError::Override(OverrideError::Build { .. })
  ));
}

#[tokio::test]
async fn test_missing_groups_file() {
  let (_dir, paths) = create_project(false);
  std::fs::remove_file(paths.groups_file()).unwrap();

  let err = transform(&paths, 5000).transform().await.unwrap_err();

  assert!(matches!(err, TransformError::MissingInput { .. }));
}
