//! Implementation of the `microdeploy deploy` command.
//!
//! Runs the pipeline for an extracted release against the current deployment:
//! validate, compile packages, resolve properties, render job templates.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::debug;

use microdeploy_lib::compile::{CompileConfig, ShellExecutor};
use microdeploy_lib::deploy::{DeployConfig, DeployError, deploy};
use microdeploy_lib::manifest::DeploymentManifest;
use microdeploy_lib::progress::{Progress, Silent};
use microdeploy_lib::release::{load_release, validate};
use microdeploy_lib::workspace::Workspace;

use super::{current_manifest, manifest_dir};
use crate::output::{OutputFormat, StageReporter, format_duration, print_json, print_stat, print_success};

pub fn cmd_deploy(release_dir: &Path, stemcell: &Path, home: &Path, parallelism: usize, output: OutputFormat) -> Result<()> {
  let start = Instant::now();

  if !release_dir.is_dir() {
    bail!("Release directory not found: {}", release_dir.display());
  }
  if !stemcell.exists() {
    bail!("Stemcell not found: {}", stemcell.display());
  }

  let manifest_path = current_manifest(home)?;
  let manifest = DeploymentManifest::load(&manifest_path)?;
  let release = load_release(release_dir).context("Failed to load release")?;
  // Nothing may be created for a release that cannot be deployed.
  validate(&release).map_err(DeployError::from).context("Deploy failed")?;

  let workspace = Workspace::open(manifest_dir(&manifest_path), home).context("Failed to open deployment workspace")?;
  let _lock = workspace.lock("deploy").context("Failed to acquire workspace lock")?;
  debug!(workspace = %workspace.path().display(), stemcell = %stemcell.display(), "deploying");

  let progress: Arc<dyn Progress> = if output.is_json() {
    Arc::new(Silent)
  } else {
    Arc::new(StageReporter)
  };
  let config = DeployConfig {
    compile: CompileConfig { parallelism },
    progress,
  };
  let executor = Arc::new(ShellExecutor::new(release_dir));

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let result = rt
    .block_on(deploy(&workspace, &release, &manifest, executor, &config))
    .context("Deploy failed")?;

  if output.is_json() {
    return print_json(&result);
  }

  println!();
  print_success("Deploy complete!");
  print_stat("Deployment", &result.deployment);
  print_stat("Release", &result.release);
  print_stat("Packages compiled", &result.packages.compiled.len().to_string());
  print_stat("Packages cached", &result.packages.cached.len().to_string());
  print_stat("Jobs rendered", &result.templates.rendered.len().to_string());
  print_stat("Jobs cached", &result.templates.cached.len().to_string());
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(())
}
