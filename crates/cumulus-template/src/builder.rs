//! Stack builder.
//!
//! Each [`StackBuilder`] owns its own [`Template`]. The transform constructs
//! independent builders (one for the main stack, one for its outputs) and
//! passes them around explicitly instead of sharing an app-wide registry.

use serde_json::Value;
use tracing::debug;

use crate::error::TemplateError;
use crate::intrinsic;
use crate::template::{FORMAT_VERSION, Output, Parameter, Resource, Template};

pub struct StackBuilder {
  stack_name: String,
  template: Template,
}

impl StackBuilder {
  /// Create a builder for an empty stack.
  pub fn new(stack_name: impl Into<String>) -> Self {
    Self {
      stack_name: stack_name.into(),
      template: Template {
        format_version: Some(FORMAT_VERSION.to_string()),
        ..Default::default()
      },
    }
  }

  pub fn stack_name(&self) -> &str {
    &self.stack_name
  }

  /// Add a CFN parameter.
  pub fn add_parameter(
    &mut self,
    logical_id: &str,
    parameter: Parameter,
  ) -> Result<(), TemplateError> {
    self.check_new(logical_id, "parameter", self.template.parameters.contains_key(logical_id))?;
    debug!(stack = %self.stack_name, logical_id, "parameter added");
    self
      .template
      .parameters
      .insert(logical_id.to_string(), parameter);
    Ok(())
  }

  /// Get a `Ref` to a parameter previously added to this stack.
  pub fn parameter_ref(&self, logical_id: &str) -> Result<Value, TemplateError> {
    if !self.template.parameters.contains_key(logical_id) {
      return Err(TemplateError::UnknownParameter {
        stack: self.stack_name.clone(),
        logical_id: logical_id.to_string(),
      });
    }
    Ok(intrinsic::reference(logical_id))
  }

  /// Add a CFN condition.
  pub fn add_condition(&mut self, logical_id: &str, expression: Value) -> Result<(), TemplateError> {
    self.check_new(logical_id, "condition", self.template.conditions.contains_key(logical_id))?;
    debug!(stack = %self.stack_name, logical_id, "condition added");
    self
      .template
      .conditions
      .insert(logical_id.to_string(), expression);
    Ok(())
  }

  /// Add a resource.
  pub fn add_resource(&mut self, logical_id: &str, resource: Resource) -> Result<(), TemplateError> {
    self.check_new(logical_id, "resource", self.template.resources.contains_key(logical_id))?;
    debug!(
      stack = %self.stack_name,
      logical_id,
      resource_type = %resource.resource_type,
      "resource added"
    );
    self
      .template
      .resources
      .insert(logical_id.to_string(), resource);
    Ok(())
  }

  /// Add a CFN output.
  pub fn add_output(&mut self, logical_id: &str, output: Output) -> Result<(), TemplateError> {
    self.check_new(logical_id, "output", self.template.outputs.contains_key(logical_id))?;
    debug!(stack = %self.stack_name, logical_id, "output added");
    self.template.outputs.insert(logical_id.to_string(), output);
    Ok(())
  }

  pub fn template(&self) -> &Template {
    &self.template
  }

  /// Mutable access to the tree. This is what the override executor receives.
  pub fn template_mut(&mut self) -> &mut Template {
    &mut self.template
  }

  /// Finish the stack and return its template.
  pub fn synth(self) -> Template {
    self.template
  }

  fn check_new(&self, logical_id: &str, kind: &'static str, exists: bool) -> Result<(), TemplateError> {
    if logical_id.is_empty() || !logical_id.chars().all(|c| c.is_ascii_alphanumeric()) {
      return Err(TemplateError::InvalidLogicalId(logical_id.to_string()));
    }
    if exists {
      return Err(TemplateError::Duplicate {
        stack: self.stack_name.clone(),
        kind,
        logical_id: logical_id.to_string(),
      });
    }
    Ok(())
  }
}
