//! Transform error types.

use std::path::PathBuf;

use cumulus_override::OverrideError;
use cumulus_template::TemplateError;

/// Errors that abort a transform pass.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
  /// A required input file does not exist.
  #[error("required file not found: {}", path.display())]
  MissingInput { path: PathBuf },

  /// An input file is not valid JSON for its expected shape.
  #[error("failed to parse {}: {source}", path.display())]
  InvalidInput {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  /// Building the stacks failed.
  #[error("template generation failed: {0}")]
  Template(#[from] TemplateError),

  /// The override step failed. Never swallowed.
  #[error(transparent)]
  Override(#[from] OverrideError),

  /// The blocking override task did not complete.
  #[error("override task failed: {message}")]
  OverrideTask { message: String },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("failed to serialize build file: {0}")]
  Serialization(#[from] serde_json::Error),
}
