//! Override execution.

use std::path::Path;
use std::time::{Duration, Instant};

use cumulus_template::Template;
use tracing::{error, info, instrument, warn};

use crate::config::SandboxConfig;
use crate::error::OverrideError;
use crate::lua::LuaSandbox;
use crate::sandbox::{ENTRY_POINT, Sandbox};

/// Result of an override step that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideOutcome {
  /// No override script exists.
  NoOverride,
  /// A script exists but is empty or could not be read.
  Empty,
  /// The script ran to completion. The target may have been modified.
  Applied,
}

/// Runs override scripts against a resource tree through a [`Sandbox`].
pub struct OverrideExecutor<S = LuaSandbox> {
  sandbox: S,
  timeout: Duration,
}

impl OverrideExecutor<LuaSandbox> {
  /// Create an executor backed by a [`LuaSandbox`].
  pub fn new(config: SandboxConfig) -> Self {
    let timeout = config.timeout();
    Self {
      sandbox: LuaSandbox::new(config),
      timeout,
    }
  }
}

impl Default for OverrideExecutor<LuaSandbox> {
  fn default() -> Self {
    Self::new(SandboxConfig::default())
  }
}

impl<S: Sandbox> OverrideExecutor<S> {
  pub fn with_sandbox(sandbox: S, timeout: Duration) -> Self {
    Self { sandbox, timeout }
  }

  pub fn sandbox(&self) -> &S {
    &self.sandbox
  }

  /// Apply the override script at `path` to `target`.
  ///
  /// A missing file is not an error. An unreadable file is treated like an
  /// empty one and reported on its own diagnostic path.
  #[instrument(name = "override_apply_file", skip(self, path, target), fields(path = %path.display()))]
  pub fn apply_file(
    &self,
    path: &Path,
    target: &mut Template,
  ) -> Result<OverrideOutcome, OverrideError> {
    if !path.exists() {
      info!("No override File Found");
      return Ok(OverrideOutcome::NoOverride);
    }

    match std::fs::read_to_string(path) {
      Ok(source) => self.apply(&source, target),
      Err(e) => {
        warn!(error = %e, "override file could not be read, nothing to apply");
        Ok(OverrideOutcome::Empty)
      }
    }
  }

  /// Apply override `source` to `target`.
  ///
  /// `target` is only modified when the script completes; any error leaves
  /// it as it was and must abort the enclosing build.
  pub fn apply(
    &self,
    source: &str,
    target: &mut Template,
  ) -> Result<OverrideOutcome, OverrideError> {
    if source.trim().is_empty() {
      warn!("override file is empty, nothing to apply");
      return Ok(OverrideOutcome::Empty);
    }

    let started = Instant::now();
    let result = self
      .sandbox
      .run(source, ENTRY_POINT, target, self.timeout)
      .map_err(OverrideError::from);

    match result {
      Ok(()) => {
        info!(
          elapsed_ms = started.elapsed().as_millis() as u64,
          resources = target.resources.len(),
          "override applied"
        );
        Ok(OverrideOutcome::Applied)
      }
      Err(e) => {
        error!(timeout = e.is_timeout(), "{}", e);
        Err(e)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;
  use crate::error::SandboxError;

  /// Records calls instead of running anything.
  #[derive(Default)]
  struct RecordingSandbox {
    calls: Mutex<Vec<String>>,
  }

  impl Sandbox for RecordingSandbox {
    fn compile(&self, _source: &str) -> Result<(), SandboxError> {
      Ok(())
    }

    fn run(
      &self,
      _source: &str,
      entry: &str,
      _target: &mut Template,
      _timeout: Duration,
    ) -> Result<(), SandboxError> {
      self.calls.lock().unwrap().push(entry.to_string());
      Ok(())
    }
  }

  #[test]
  fn test_empty_source_skips_sandbox() {
    let executor = OverrideExecutor::with_sandbox(RecordingSandbox::default(), Duration::from_secs(1));
    let mut target = Template::default();

    let outcome = executor.apply("  \n\t", &mut target).unwrap();

    assert_eq!(outcome, OverrideOutcome::Empty);
    assert!(executor.sandbox().calls.lock().unwrap().is_empty());
  }

  #[test]
  fn test_calls_override_entry_point() {
    let executor = OverrideExecutor::with_sandbox(RecordingSandbox::default(), Duration::from_secs(1));
    let mut target = Template::default();

    let outcome = executor
      .apply("function override(t) end", &mut target)
      .unwrap();

    assert_eq!(outcome, OverrideOutcome::Applied);
    assert_eq!(*executor.sandbox().calls.lock().unwrap(), vec!["override"]);
  }
}
