//! The deploy pipeline: validate, compile, resolve, render.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::compile::{CompileConfig, CompileError, CompiledPackages, Executor, compile_packages};
use crate::manifest::ManifestSource;
use crate::progress::{Progress, Silent};
use crate::properties;
use crate::release::{self, Release, ReleaseError};
use crate::render::{RenderError, RenderedTemplates, render_jobs};
use crate::workspace::Workspace;

#[derive(Debug, Error)]
pub enum DeployError {
  #[error(transparent)]
  Release(#[from] ReleaseError),

  #[error(transparent)]
  Compile(#[from] CompileError),

  #[error(transparent)]
  Render(#[from] RenderError),
}

impl DeployError {
  /// Process exit status for this failure.
  pub fn exit_code(&self) -> i32 {
    match self {
      DeployError::Release(ReleaseError::NotCpiRelease { .. } | ReleaseError::UnknownJobPackage { .. }) => 1,
      _ => 2,
    }
  }
}

#[derive(Clone)]
pub struct DeployConfig {
  pub compile: CompileConfig,
  /// Receives a started/finished event per package and job.
  pub progress: Arc<dyn Progress>,
}

impl Default for DeployConfig {
  fn default() -> Self {
    Self {
      compile: CompileConfig::default(),
      progress: Arc::new(Silent),
    }
  }
}

impl fmt::Debug for DeployConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DeployConfig").field("compile", &self.compile).finish_non_exhaustive()
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployResult {
  pub deployment: String,
  pub release: String,
  pub packages: CompiledPackages,
  pub templates: RenderedTemplates,
}

/// Run the pipeline for `release` against `workspace`.
///
/// Validation happens before anything is written. Artifacts stored before a
/// later failure stay recorded and are reused by the next attempt.
pub async fn deploy<E: Executor, M: ManifestSource>(
  workspace: &Workspace,
  release: &Release,
  manifest: &M,
  executor: Arc<E>,
  config: &DeployConfig,
) -> Result<DeployResult, DeployError> {
  release::validate(release)?;

  let packages = compile_packages(
    release.packages(),
    workspace.blobs(),
    workspace.compiled_packages(),
    executor,
    &config.compile,
    Arc::clone(&config.progress),
  )
  .await?;

  let jobs = release
    .jobs()
    .iter()
    .map(|job| {
      let properties = properties::resolve(
        job,
        &manifest.property_overrides_for(&job.name),
        &manifest.network_values_for(&job.name),
      );
      (job.clone(), properties)
    })
    .collect();

  let templates = render_jobs(jobs, workspace.blobs(), workspace.templates(), Arc::clone(&config.progress)).await?;

  info!(
    deployment = %workspace.uuid(),
    release = %release.name,
    compiled = packages.compiled.len(),
    rendered = templates.rendered.len(),
    "deploy finished"
  );

  Ok(DeployResult {
    deployment: workspace.uuid().to_string(),
    release: release.name.clone(),
    packages,
    templates,
  })
}
