//! Cumulus Template
//!
//! This crate contains the in-memory resource tree that the user-pool group
//! transform generates, plus the [`StackBuilder`] used to assemble it.
//!
//! A [`Template`] is the unit that flows through the pipeline:
//! - built by one or more [`StackBuilder`]s
//! - handed (mutably) to the override executor
//! - serialized to a CloudFormation JSON document
//!
//! All maps are ordered by logical id so serialization is deterministic.

mod builder;
mod error;
pub mod intrinsic;
mod template;

pub use builder::StackBuilder;
pub use error::TemplateError;
pub use template::{FORMAT_VERSION, Output, Parameter, Resource, Template};
