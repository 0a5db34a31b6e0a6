//! User-pool group transform.
//!
//! The [`UserPoolGroupTransform`] owns the override executor and drives one
//! generation pass: `build -> apply override -> synthesize -> save`. Each
//! step is sequential; an override failure aborts the pass before anything
//! is written.

use std::sync::Arc;

use cumulus_override::{
  OverrideExecutor, OverrideOutcome, build_override_dir, built_override_path,
};
use cumulus_template::{StackBuilder, Template, intrinsic};
use serde_json::json;
use tokio::fs;
use tracing::{error, info, instrument};

use crate::config::TransformConfig;
use crate::error::TransformError;
use crate::groups::load_groups;
use crate::inputs::load_cli_inputs;
use crate::paths::{ProjectPaths, RESOURCE_NAME};
use crate::stack::{StackOptions, generate_stacks, synthesize};

pub struct UserPoolGroupTransform {
  auth_resource_name: String,
  paths: ProjectPaths,
  executor: Arc<OverrideExecutor>,
}

impl UserPoolGroupTransform {
  pub fn new(config: TransformConfig) -> Self {
    Self {
      auth_resource_name: config.auth_resource_name,
      paths: config.paths,
      executor: Arc::new(OverrideExecutor::new(config.sandbox)),
    }
  }

  pub fn paths(&self) -> &ProjectPaths {
    &self.paths
  }

  /// Run a full generation pass and return the saved template.
  #[instrument(
    name = "user_pool_group_transform",
    skip(self),
    fields(auth_resource = %self.auth_resource_name)
  )]
  pub async fn transform(&self) -> Result<Template, TransformError> {
    info!("transform_started");

    let result = self.transform_inner().await;

    match &result {
      Ok(template) => {
        info!(resources = template.resources.len(), "transform_completed");
      }
      Err(e) => {
        error!(error = %e, "transform_failed");
      }
    }

    result
  }

  async fn transform_inner(&self) -> Result<Template, TransformError> {
    let options = self.generate_stack_options().await?;

    let (mut stack, outputs) = generate_stacks(&options)?;

    self.apply_override(&mut stack).await?;

    let template = synthesize(stack, outputs);

    self.save_build_files(&template).await?;

    Ok(template)
  }

  /// Read the group list and the auth resource's identity pool setting.
  pub async fn generate_stack_options(&self) -> Result<StackOptions, TransformError> {
    let groups = load_groups(&self.paths.groups_file()).await?;
    let cli_inputs = load_cli_inputs(&self.paths.cli_inputs_file(&self.auth_resource_name)).await?;

    Ok(StackOptions {
      groups,
      identity_pool_name: cli_inputs.cognito_config.identity_pool_name,
      cognito_resource_name: self.auth_resource_name.clone(),
    })
  }

  /// Stage the override source and run it against the main stack.
  pub async fn apply_override(
    &self,
    stack: &mut StackBuilder,
  ) -> Result<OverrideOutcome, TransformError> {
    let override_dir = self.paths.resource_dir();

    let is_built = build_override_dir(self.executor.sandbox(), &override_dir).await?;
    if !is_built {
      info!(
        "No override File Found. To override {} run amplify override auth",
        RESOURCE_NAME
      );
      return Ok(OverrideOutcome::NoOverride);
    }

    let executor = self.executor.clone();
    let script_path = built_override_path(&override_dir);
    let (tree, outcome) =
      run_detached(stack.template().clone(), move |tree| executor.apply_file(&script_path, tree))
        .await?;

    let outcome = outcome?;
    *stack.template_mut() = tree;
    Ok(outcome)
  }

  /// Write the template and `parameters.json` into the build directory.
  pub async fn save_build_files(&self, template: &Template) -> Result<(), TransformError> {
    fs::create_dir_all(self.paths.build_dir()).await?;

    let template_path = self.paths.template_file();
    fs::write(&template_path, template.to_json_pretty()?).await?;

    let parameters = json!({
      "AuthRoleArn": intrinsic::get_att("AuthRole", "Arn"),
      "UnauthRoleArn": intrinsic::get_att("UnauthRole", "Arn"),
    });
    let parameters_path = self.paths.parameters_file();
    fs::write(&parameters_path, serde_json::to_string_pretty(&parameters)?).await?;

    info!(
      template = %template_path.display(),
      parameters = %parameters_path.display(),
      "build files saved"
    );
    Ok(())
  }
}

/// Run `apply` on a copy of the tree off the async workers.
///
/// The caller's tree is only replaced from the returned copy, so a task that
/// panics leaves it untouched.
async fn run_detached<F, T>(tree: Template, apply: F) -> Result<(Template, T), TransformError>
where
  F: FnOnce(&mut Template) -> T + Send + 'static,
  T: Send + 'static,
{
  tokio::task::spawn_blocking(move || {
    let mut tree = tree;
    let result = apply(&mut tree);
    (tree, result)
  })
  .await
  .map_err(|e| TransformError::OverrideTask {
    message: e.to_string(),
  })
}
