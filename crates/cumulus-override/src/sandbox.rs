use std::time::Duration;

use cumulus_template::Template;

use crate::error::SandboxError;

/// Name of the function an override script must expose.
pub const ENTRY_POINT: &str = "override";

/// An isolated interpreter for untrusted override scripts.
///
/// Implementations must not give the script any host capability other than
/// the `target` tree, and must abort the script once `timeout` elapses even
/// if it never yields.
pub trait Sandbox: Send + Sync {
  /// Check that `source` compiles, without running it.
  fn compile(&self, source: &str) -> Result<(), SandboxError>;

  /// Run `source`, then call its `entry` function with `target`.
  ///
  /// On success the script's mutations are written back to `target`. On any
  /// error `target` is left as it was.
  fn run(
    &self,
    source: &str,
    entry: &str,
    target: &mut Template,
    timeout: Duration,
  ) -> Result<(), SandboxError>;
}
