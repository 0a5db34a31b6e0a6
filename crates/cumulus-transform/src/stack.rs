//! User-pool group stack generation.

use cumulus_template::{Output, Parameter, Resource, StackBuilder, Template, TemplateError, intrinsic};
use serde_json::{Value, json};
use tracing::debug;

use crate::groups::UserPoolGroup;

pub const MAIN_STACK_NAME: &str = "AmplifyUserPoolGroupStack";
pub const OUTPUTS_STACK_NAME: &str = "AmplifyUserPoolGroupStackOutputs";

const ENV_PARAMETER: &str = "env";
const SHOULD_NOT_CREATE_ENV_RESOURCES: &str = "ShouldNotCreateEnvResources";

/// Everything stack generation needs.
#[derive(Debug, Clone)]
pub struct StackOptions {
  pub groups: Vec<UserPoolGroup>,
  pub identity_pool_name: Option<String>,
  pub cognito_resource_name: String,
}

impl StackOptions {
  fn param(&self, suffix: &str) -> String {
    format!("auth{}{}", self.cognito_resource_name, suffix)
  }

  fn user_pool_id(&self) -> String {
    self.param("UserPoolId")
  }

  fn identity_pool_id(&self) -> String {
    self.param("IdentityPoolId")
  }
}

/// Build the main stack and its outputs stack.
///
/// Outputs live on a separate builder so that overrides applied to the main
/// stack cannot collide with the generated output names.
pub fn generate_stacks(options: &StackOptions) -> Result<(StackBuilder, StackBuilder), TemplateError> {
  let mut stack = StackBuilder::new(MAIN_STACK_NAME);
  let mut outputs = StackBuilder::new(OUTPUTS_STACK_NAME);

  add_parameters(&mut stack, options)?;

  let env = stack.parameter_ref(ENV_PARAMETER)?;
  stack.add_condition(
    SHOULD_NOT_CREATE_ENV_RESOURCES,
    intrinsic::equals(env, json!("NONE")),
  )?;

  for group in &options.groups {
    add_group_resources(&mut stack, options, group)?;

    if options.identity_pool_name.is_some() {
      let role = role_logical_id(group);
      outputs.add_output(&role, Output::new(intrinsic::get_att(&role, "Arn")))?;
    }
  }

  debug!(
    groups = options.groups.len(),
    identity_pool = options.identity_pool_name.is_some(),
    "user pool group stacks generated"
  );

  Ok((stack, outputs))
}

/// Combine the main stack with its outputs stack into one template.
pub fn synthesize(stack: StackBuilder, outputs: StackBuilder) -> Template {
  let mut template = stack.synth();
  template.merge_outputs(outputs.synth());
  template
}

fn add_parameters(stack: &mut StackBuilder, options: &StackOptions) -> Result<(), TemplateError> {
  stack.add_parameter(ENV_PARAMETER, Parameter::string())?;
  stack.add_parameter("AuthRoleArn", Parameter::string())?;
  stack.add_parameter("UnauthRoleArn", Parameter::string())?;

  let mut defaulted = vec![options.user_pool_id()];
  if options.identity_pool_name.is_some() {
    defaulted.push(options.identity_pool_id());
  }
  defaulted.push(options.param("AppClientID"));
  defaulted.push(options.param("AppClientIDWeb"));

  for name in defaulted {
    stack.add_parameter(&name, Parameter::string().with_default(name.clone()))?;
  }

  Ok(())
}

fn add_group_resources(
  stack: &mut StackBuilder,
  options: &StackOptions,
  group: &UserPoolGroup,
) -> Result<(), TemplateError> {
  let user_pool_id = stack.parameter_ref(&options.user_pool_id())?;

  let mut group_resource = Resource::new("AWS::Cognito::UserPoolGroup")
    .property("GroupName", group.group_name.clone())
    .property("Precedence", group.precedence)
    .property("UserPoolId", user_pool_id.clone());

  if options.identity_pool_name.is_some() {
    let role = role_logical_id(group);
    let identity_pool_id = stack.parameter_ref(&options.identity_pool_id())?;

    stack.add_resource(&role, group_role(group, user_pool_id, identity_pool_id))?;

    group_resource = group_resource.property("RoleArn", intrinsic::get_att(&role, "Arn"));
    group_resource.depends_on.push(role);
  }

  stack.add_resource(&format!("{}Group", group.group_name), group_resource)
}

fn group_role(group: &UserPoolGroup, user_pool_id: Value, identity_pool_id: Value) -> Resource {
  let role_name = intrinsic::join(
    "",
    vec![user_pool_id, json!(format!("-{}GroupRole", group.group_name))],
  );

  let assume_role_policy = json!({
    "Version": "2012-10-17",
    "Statement": [{
      "Sid": "",
      "Effect": "Allow",
      "Principal": { "Federated": "cognito-identity.amazonaws.com" },
      "Action": "sts:AssumeRoleWithWebIdentity",
      "Condition": {
        "StringEquals": { "cognito-identity.amazonaws.com:aud": identity_pool_id },
        "ForAnyValue:StringLike": { "cognito-identity.amazonaws.com:amr": "authenticated" }
      }
    }]
  });

  let mut role = Resource::new("AWS::IAM::Role")
    .property("RoleName", role_name)
    .property("AssumeRolePolicyDocument", assume_role_policy);

  if let Some(policies) = &group.custom_policies {
    role = role.property("Policies", Value::Array(policies.clone()));
  }

  role
}

fn role_logical_id(group: &UserPoolGroup) -> String {
  format!("{}GroupRole", group.group_name)
}
