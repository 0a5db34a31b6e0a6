use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cumulus_override::{LuaSandbox, Sandbox, SandboxConfig};
use cumulus_transform::{ProjectPaths, TransformConfig, UserPoolGroupTransform};

/// Cumulus - CloudFormation generation for Cognito user-pool groups
#[derive(Parser)]
#[command(name = "cumulus")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Project root containing the `amplify/` directory (default: current directory)
  #[arg(long, global = true)]
  project_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Generate the user-pool groups template, applying any override
  Transform {
    /// Name of the Cognito auth resource the groups belong to
    auth_resource: String,

    #[command(flatten)]
    sandbox: SandboxArgs,
  },

  /// Work with override scripts
  Override {
    #[command(subcommand)]
    action: OverrideAction,
  },
}

#[derive(Subcommand)]
enum OverrideAction {
  /// Check that an override script compiles
  Check {
    /// Path to the override script
    file: PathBuf,
  },
}

#[derive(clap::Args)]
struct SandboxArgs {
  /// Override wall-clock budget in milliseconds
  #[arg(long, default_value_t = 5000)]
  override_timeout_ms: u64,

  /// Override memory limit in MiB
  #[arg(long, default_value_t = 64, value_parser = clap::value_parser!(u64).range(1..=4096))]
  override_memory_mb: u64,
}

impl SandboxArgs {
  fn into_config(self) -> Result<SandboxConfig> {
    let memory_limit = self
      .override_memory_mb
      .checked_mul(1024 * 1024)
      .and_then(|bytes| usize::try_from(bytes).ok())
      .with_context(|| {
        format!(
          "override memory limit of {} MiB is not addressable on this platform",
          self.override_memory_mb
        )
      })?;

    Ok(SandboxConfig {
      timeout_ms: self.override_timeout_ms,
      memory_limit: Some(memory_limit),
      ..Default::default()
    })
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let project_dir = match cli.project_dir {
    Some(dir) => dir,
    None => std::env::current_dir().context("could not determine current directory")?,
  };

  match cli.command {
    Some(Commands::Transform {
      auth_resource,
      sandbox,
    }) => {
      run_transform(project_dir, auth_resource, sandbox.into_config()?)?;
    }
    Some(Commands::Override {
      action: OverrideAction::Check { file },
    }) => {
      check_override(file)?;
    }
    None => {
      println!("cumulus - use --help to see available commands");
    }
  }

  Ok(())
}

fn run_transform(project_dir: PathBuf, auth_resource: String, sandbox: SandboxConfig) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run_transform_async(project_dir, auth_resource, sandbox).await })
}

async fn run_transform_async(
  project_dir: PathBuf,
  auth_resource: String,
  sandbox: SandboxConfig,
) -> Result<()> {
  let paths = ProjectPaths::from_project_dir(&project_dir);
  let mut config = TransformConfig::new(auth_resource, paths);
  config.sandbox = sandbox;

  let transform = UserPoolGroupTransform::new(config);
  let template = transform
    .transform()
    .await
    .context("user pool group transform failed")?;

  eprintln!(
    "Generated {} resources, {} outputs",
    template.resources.len(),
    template.outputs.len()
  );
  println!("{}", transform.paths().template_file().display());

  Ok(())
}

fn check_override(file: PathBuf) -> Result<()> {
  let source = std::fs::read_to_string(&file)
    .with_context(|| format!("failed to read override file: {}", file.display()))?;

  LuaSandbox::new(SandboxConfig::default())
    .compile(&source)
    .with_context(|| format!("override does not compile: {}", file.display()))?;

  eprintln!("{} compiles", file.display());
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sandbox_args(args: &[&str]) -> Result<SandboxArgs, clap::Error> {
    let argv = ["cumulus", "transform", "cognito1234"].iter().chain(args);
    match Cli::try_parse_from(argv)?.command {
      Some(Commands::Transform { sandbox, .. }) => Ok(sandbox),
      _ => panic!("expected transform command"),
    }
  }

  #[test]
  fn test_default_memory_limit() {
    let config = sandbox_args(&[]).unwrap().into_config().unwrap();
    assert_eq!(config.memory_limit, Some(64 * 1024 * 1024));
    assert_eq!(config.timeout_ms, 5000);
  }

  #[test]
  fn test_memory_limit_out_of_range_is_rejected() {
    assert!(sandbox_args(&["--override-memory-mb", "0"]).is_err());
    assert!(sandbox_args(&["--override-memory-mb", "18446744073709551615"]).is_err());
  }

  #[test]
  fn test_memory_limit_converts_to_bytes() {
    let config = sandbox_args(&["--override-memory-mb", "4096"])
      .unwrap()
      .into_config()
      .unwrap();
    assert_eq!(config.memory_limit, Some(4096 * 1024 * 1024));
  }
}
