//! Cumulus Transform
//!
//! Generates the CloudFormation template for Cognito user-pool groups.
//!
//! [`UserPoolGroupTransform::transform`] runs the whole pass:
//! 1. read `user-pool-group-precedence.json` and the auth resource's CLI inputs
//! 2. build the main stack and its outputs stack
//! 3. stage and apply the user's override script to the main stack
//! 4. synthesize one template and write it with `parameters.json`

mod config;
mod error;
mod groups;
mod inputs;
mod paths;
mod stack;
mod transform;

pub use config::TransformConfig;
pub use error::TransformError;
pub use groups::{UserPoolGroup, load_groups, substitute_env};
pub use inputs::{CliInputs, CognitoConfig, load_cli_inputs};
pub use paths::{ProjectPaths, RESOURCE_NAME};
pub use stack::{
  MAIN_STACK_NAME, OUTPUTS_STACK_NAME, StackOptions, generate_stacks, synthesize,
};
pub use transform::UserPoolGroupTransform;
