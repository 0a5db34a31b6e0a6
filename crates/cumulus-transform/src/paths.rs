use std::path::{Path, PathBuf};

/// Name of the user-pool groups resource inside the auth category.
pub const RESOURCE_NAME: &str = "userPoolGroups";

const CATEGORY: &str = "auth";

/// Resolves the files the transform reads and writes.
///
/// ```text
/// {backend}/auth/
/// ├── {cognito_resource}/cli-inputs.json
/// └── userPoolGroups/
///     ├── user-pool-group-precedence.json
///     ├── override.lua
///     └── build/
/// ```
#[derive(Debug, Clone)]
pub struct ProjectPaths {
  backend_dir: PathBuf,
}

impl ProjectPaths {
  /// Paths for a project root (the directory that contains `amplify/`).
  pub fn from_project_dir(project_dir: impl AsRef<Path>) -> Self {
    Self::new(project_dir.as_ref().join("amplify").join("backend"))
  }

  pub fn new(backend_dir: impl Into<PathBuf>) -> Self {
    Self {
      backend_dir: backend_dir.into(),
    }
  }

  pub fn backend_dir(&self) -> &Path {
    &self.backend_dir
  }

  /// The user-pool groups directory; also where the override source lives.
  pub fn resource_dir(&self) -> PathBuf {
    self.backend_dir.join(CATEGORY).join(RESOURCE_NAME)
  }

  pub fn build_dir(&self) -> PathBuf {
    self.resource_dir().join("build")
  }

  pub fn groups_file(&self) -> PathBuf {
    self.resource_dir().join("user-pool-group-precedence.json")
  }

  pub fn cli_inputs_file(&self, cognito_resource: &str) -> PathBuf {
    self
      .backend_dir
      .join(CATEGORY)
      .join(cognito_resource)
      .join("cli-inputs.json")
  }

  pub fn template_file(&self) -> PathBuf {
    self
      .build_dir()
      .join(format!("{}-cloudformation-template.json", RESOURCE_NAME))
  }

  pub fn parameters_file(&self) -> PathBuf {
    self.build_dir().join("parameters.json")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_paths_from_project_dir() {
    let paths = ProjectPaths::from_project_dir("/proj");

    assert_eq!(paths.backend_dir(), Path::new("/proj/amplify/backend"));
    assert_eq!(
      paths.groups_file(),
      Path::new("/proj/amplify/backend/auth/userPoolGroups/user-pool-group-precedence.json")
    );
    assert_eq!(
      paths.cli_inputs_file("cognito1234"),
      Path::new("/proj/amplify/backend/auth/cognito1234/cli-inputs.json")
    );
    assert_eq!(
      paths.template_file(),
      Path::new(
        "/proj/amplify/backend/auth/userPoolGroups/build/userPoolGroups-cloudformation-template.json"
      )
    );
  }
}
