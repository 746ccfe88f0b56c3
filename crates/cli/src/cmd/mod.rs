mod clean;
mod deploy;
mod deployment;
mod gc;

pub use clean::cmd_clean;
pub use deploy::cmd_deploy;
pub use deployment::cmd_deployment;
pub use gc::cmd_gc;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use microdeploy_lib::config::UserConfig;

/// The manifest path recorded by `microdeploy deployment`.
fn current_manifest(home: &Path) -> Result<PathBuf> {
  let config = UserConfig::load(home).context("Failed to load config")?;
  match config.deployment {
    Some(path) => Ok(path),
    None => bail!("No deployment set. Run `microdeploy deployment <MANIFEST>` first."),
  }
}

/// Directory holding the manifest and its `deployment.json`.
fn manifest_dir(manifest: &Path) -> &Path {
  manifest.parent().unwrap_or(Path::new("."))
}
