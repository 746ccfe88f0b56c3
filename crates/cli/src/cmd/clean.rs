//! Implementation of the `microdeploy clean` command.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use microdeploy_lib::workspace::Workspace;

use super::{current_manifest, manifest_dir};
use crate::output::{OutputFormat, print_info, print_json, print_success};
use crate::prompts::confirm;

#[derive(Serialize)]
struct CleanResult {
  removed: Option<String>,
}

pub fn cmd_clean(force: bool, home: &Path, output: OutputFormat) -> Result<()> {
  let manifest_path = current_manifest(home)?;
  let Some(workspace) =
    Workspace::find(manifest_dir(&manifest_path), home).context("Failed to open deployment workspace")?
  else {
    if output.is_json() {
      return print_json(&CleanResult { removed: None });
    }
    print_info("Nothing to clean");
    return Ok(());
  };

  if !confirm(
    &format!("Remove workspace {} and all compiled artifacts?", workspace.uuid()),
    force,
  )? {
    print_info("Aborted");
    return Ok(());
  }

  let lock = workspace.lock("clean").context("Failed to acquire workspace lock")?;
  workspace.clean().context("Failed to clean workspace")?;
  drop(lock);

  if output.is_json() {
    return print_json(&CleanResult {
      removed: Some(workspace.uuid().to_string()),
    });
  }
  print_success(&format!("Removed workspace {}", workspace.uuid()));
  Ok(())
}
