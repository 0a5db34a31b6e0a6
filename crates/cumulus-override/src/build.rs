//! Override build step.
//!
//! Overrides live next to the resource they customize:
//! ```text
//! {category_dir}/
//! ├── override.lua
//! └── build/
//!     └── override.lua   (staged by this step)
//! ```

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{error, info};

use crate::error::OverrideError;
use crate::sandbox::Sandbox;

/// File name of the override source, in the category directory and in `build/`.
pub const OVERRIDE_FILE_NAME: &str = "override.lua";

/// Path of the staged override for a category directory.
pub fn built_override_path(override_dir: &Path) -> PathBuf {
  override_dir.join("build").join(OVERRIDE_FILE_NAME)
}

/// Compile-check the override source in `override_dir` and stage it.
///
/// Returns `false` when there is no override source, `true` once the staged
/// copy has been written.
pub async fn build_override_dir<S: Sandbox>(
  sandbox: &S,
  override_dir: &Path,
) -> Result<bool, OverrideError> {
  let source_path = override_dir.join(OVERRIDE_FILE_NAME);
  if !fs::try_exists(&source_path).await? {
    return Ok(false);
  }

  let source = fs::read_to_string(&source_path).await?;

  if let Err(e) = sandbox.compile(&source) {
    let err = OverrideError::build(e.to_string());
    error!("{}", err);
    return Err(err);
  }

  let built_path = built_override_path(override_dir);
  if let Some(parent) = built_path.parent() {
    fs::create_dir_all(parent).await?;
  }
  fs::write(&built_path, source).await?;

  info!(path = %built_path.display(), "override staged");
  Ok(true)
}
