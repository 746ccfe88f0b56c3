//! Implementation of the `microdeploy deployment` command.
//!
//! With a manifest argument, makes it the current deployment and opens (or
//! creates) its workspace. Without one, shows the current deployment.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use microdeploy_lib::config::UserConfig;
use microdeploy_lib::manifest::DeploymentManifest;
use microdeploy_lib::workspace::Workspace;

use super::{current_manifest, manifest_dir};
use crate::output::{OutputFormat, print_info, print_json, print_stat, print_success};

#[derive(Serialize)]
struct DeploymentInfo<'a> {
  name: &'a str,
  manifest: &'a Path,
  uuid: &'a str,
  workspace: &'a Path,
}

pub fn cmd_deployment(manifest: Option<&Path>, home: &Path, output: OutputFormat) -> Result<()> {
  let (manifest_path, changed) = match manifest {
    Some(path) => {
      let path = dunce::canonicalize(path).with_context(|| format!("Deployment manifest not found: {}", path.display()))?;
      (path, true)
    }
    None => (current_manifest(home)?, false),
  };

  let manifest = DeploymentManifest::load(&manifest_path)?;
  let workspace = Workspace::open(manifest_dir(&manifest_path), home).context("Failed to open deployment workspace")?;

  if changed {
    UserConfig {
      deployment: Some(manifest_path.clone()),
    }
    .save(home)
    .context("Failed to save config")?;
  }

  if output.is_json() {
    return print_json(&DeploymentInfo {
      name: &manifest.name,
      manifest: &manifest_path,
      uuid: workspace.uuid(),
      workspace: workspace.path(),
    });
  }

  if changed {
    print_success(&format!("Deployment set to '{}'", manifest_path.display()));
  } else {
    print_info(&format!("Current deployment is '{}'", manifest_path.display()));
  }
  print_stat("Name", &manifest.name);
  print_stat("UUID", workspace.uuid());
  print_stat("Workspace", &workspace.path().display().to_string());

  Ok(())
}
