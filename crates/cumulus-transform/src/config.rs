use cumulus_override::SandboxConfig;

use crate::paths::ProjectPaths;

/// Configuration for a transform pass.
#[derive(Debug, Clone)]
pub struct TransformConfig {
  /// Name of the Cognito auth resource the groups belong to.
  pub auth_resource_name: String,
  /// Where inputs are read and build files are written.
  pub paths: ProjectPaths,
  /// Override sandbox limits.
  pub sandbox: SandboxConfig,
}

impl TransformConfig {
  pub fn new(auth_resource_name: impl Into<String>, paths: ProjectPaths) -> Self {
    Self {
      auth_resource_name: auth_resource_name.into(),
      paths,
      sandbox: SandboxConfig::default(),
    }
  }
}
