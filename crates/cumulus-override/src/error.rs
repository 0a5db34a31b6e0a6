use thiserror::Error;

/// Errors raised by a [`Sandbox`](crate::Sandbox) implementation.
#[derive(Debug, Error)]
pub enum SandboxError {
  /// The Lua state could not be set up.
  #[error("sandbox setup failed: {message}")]
  Setup { message: String },

  /// The script failed to compile.
  #[error("{message}")]
  Compile { message: String },

  /// The script raised an error or touched a capability that is not there.
  #[error("{message}")]
  Runtime { message: String },

  /// The script does not expose the entry point.
  #[error("override script does not define a '{entry}' function")]
  MissingEntryPoint { entry: String },

  /// The tree handed back by the script is not a valid template.
  #[error("override produced an invalid resource tree: {message}")]
  InvalidTree { message: String },

  /// The script ran past its deadline and was aborted.
  #[error("execution exceeded {timeout_ms}ms")]
  Timeout { timeout_ms: u64 },
}

/// Errors surfaced by the override step. All of them abort the enclosing build.
#[derive(Debug, Error)]
pub enum OverrideError {
  /// The override source could not be prepared.
  #[error("Build error : {message}")]
  Build { message: String },

  /// The script failed inside the sandbox.
  #[error("Skipping override due to {message}")]
  Runtime { message: String },

  /// The script exceeded its wall-clock budget.
  #[error("Skipping override due to timeout: script ran longer than {timeout_ms}ms")]
  Timeout { timeout_ms: u64 },

  /// Staging the override source failed.
  #[error("failed to stage override: {0}")]
  Io(#[from] std::io::Error),
}

impl OverrideError {
  pub fn build(message: impl Into<String>) -> Self {
    Self::Build {
      message: message.into(),
    }
  }

  pub fn runtime(message: impl Into<String>) -> Self {
    Self::Runtime {
      message: message.into(),
    }
  }

  /// Whether the error came from the deadline rather than from the script.
  pub fn is_timeout(&self) -> bool {
    matches!(self, Self::Timeout { .. })
  }
}

impl From<SandboxError> for OverrideError {
  fn from(err: SandboxError) -> Self {
    match err {
      SandboxError::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
      other => Self::runtime(other.to_string()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_timeout_stays_distinct() {
    let err: OverrideError = SandboxError::Timeout { timeout_ms: 50 }.into();
    assert!(err.is_timeout());
    assert!(err.to_string().contains("50ms"));
  }

  #[test]
  fn test_runtime_message_is_prefixed() {
    let err: OverrideError = SandboxError::Runtime {
      message: "override.lua:2: boom".to_string(),
    }
    .into();
    assert!(!err.is_timeout());
    assert_eq!(err.to_string(), "Skipping override due to override.lua:2: boom");
  }

  #[test]
  fn test_missing_entry_point_is_runtime() {
    let err: OverrideError = SandboxError::MissingEntryPoint {
      entry: "override".to_string(),
    }
    .into();
    assert!(matches!(err, OverrideError::Runtime { .. }));
  }
}
