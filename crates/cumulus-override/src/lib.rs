//! Sandboxed override execution for cumulus.
//!
//! An override is a user-authored Lua script that customizes a generated
//! [`Template`](cumulus_template::Template) before it is serialized. The script
//! is untrusted, so it runs in a fresh, capability-restricted Lua state with a
//! wall-clock deadline enforced by the host.
//!
//! This crate provides:
//! - [`Sandbox`], the execution seam, and [`LuaSandbox`], its implementation
//! - [`OverrideExecutor`], which maps sandbox results to the three override
//!   outcomes (nothing to apply, applied, error)
//! - [`build_override_dir`], the step that compile-checks an override source
//!   and stages it into the category's `build/` directory

mod build;
mod config;
mod diagnostic;
mod error;
mod executor;
mod guard;
mod lua;
mod sandbox;

pub use build::{OVERRIDE_FILE_NAME, build_override_dir, built_override_path};
pub use config::SandboxConfig;
pub use error::{OverrideError, SandboxError};
pub use executor::{OverrideExecutor, OverrideOutcome};
pub use lua::LuaSandbox;
pub use sandbox::{ENTRY_POINT, Sandbox};
