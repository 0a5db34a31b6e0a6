use std::time::Duration;

/// Configuration for the override sandbox.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
  /// Wall-clock budget for one override run, in milliseconds.
  pub timeout_ms: u64,
  /// Upper bound on memory the Lua state may allocate, in bytes.
  pub memory_limit: Option<usize>,
  /// Number of VM instructions between deadline checks.
  pub hook_interval: u32,
}

impl SandboxConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }
}

impl Default for SandboxConfig {
  fn default() -> Self {
    Self {
      timeout_ms: 5000,
      memory_limit: Some(64 * 1024 * 1024),
      hook_interval: 1000,
    }
  }
}
