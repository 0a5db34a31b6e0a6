//! CLI inputs of the Cognito auth resource.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::TransformError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliInputs {
  #[serde(default)]
  pub cognito_config: CognitoConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CognitoConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub identity_pool_name: Option<String>,
}

/// Read `cli-inputs.json` for the auth resource. The file must exist.
pub async fn load_cli_inputs(path: &Path) -> Result<CliInputs, TransformError> {
  if !fs::try_exists(path).await? {
    return Err(TransformError::MissingInput {
      path: path.to_path_buf(),
    });
  }

  let content = fs::read_to_string(path).await?;
  serde_json::from_str(&content).map_err(|e| TransformError::InvalidInput {
    path: path.to_path_buf(),
    source: e,
  })
}
