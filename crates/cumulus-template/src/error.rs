use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
  #[error("invalid logical id '{0}': must be non-empty and alphanumeric")]
  InvalidLogicalId(String),

  #[error("{kind} '{logical_id}' is already defined in stack '{stack}'")]
  Duplicate {
    stack: String,
    kind: &'static str,
    logical_id: String,
  },

  #[error("parameter '{logical_id}' is not defined in stack '{stack}'")]
  UnknownParameter { stack: String, logical_id: String },

  #[error("failed to serialize template: {0}")]
  Serialization(#[from] serde_json::Error),
}
