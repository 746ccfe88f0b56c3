mod cmd;
mod output;
mod prompts;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use microdeploy_lib::deploy::DeployError;
use microdeploy_lib::platform::paths::microdeploy_home;

use crate::output::{OutputFormat, print_error};

/// microdeploy - compile and render CPI releases into a deployment workspace
#[derive(Parser)]
#[command(name = "microdeploy")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text", global = true)]
  output: OutputFormat,

  /// Maximum number of packages compiled in parallel
  #[arg(long, default_value_t = 4, global = true)]
  parallelism: usize,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Set or show the current deployment manifest
  Deployment {
    /// Path to the deployment manifest
    manifest: Option<PathBuf>,
  },

  /// Deploy an extracted CPI release to the current deployment
  Deploy {
    /// Path to the extracted release directory
    release: PathBuf,

    /// Path to the stemcell
    stemcell: PathBuf,
  },

  /// Remove the current deployment's workspace
  Clean {
    /// Skip confirmation prompt
    #[arg(long)]
    force: bool,
  },

  /// Remove blobs no longer referenced by the current deployment
  Gc {
    /// Show what would be removed without removing it
    #[arg(long)]
    dry_run: bool,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let home = microdeploy_home();
  let result: Result<()> = match &cli.command {
    Commands::Deployment { manifest } => cmd::cmd_deployment(manifest.as_deref(), &home, cli.output),
    Commands::Deploy { release, stemcell } => cmd::cmd_deploy(release, stemcell, &home, cli.parallelism, cli.output),
    Commands::Clean { force } => cmd::cmd_clean(*force, &home, cli.output),
    Commands::Gc { dry_run } => cmd::cmd_gc(*dry_run, &home, cli.output),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{err:#}"));
      let code = err.downcast_ref::<DeployError>().map(DeployError::exit_code).unwrap_or(1);
      ExitCode::from(code as u8)
    }
  }
}

/// Logs go to stderr. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
  let default_level = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}
