//! The seam between the compiler and whatever actually builds a package.

use std::collections::BTreeMap;
use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::release::Package;
use crate::store::{BlobRef, BlobStore, StoreError};
use crate::util::archive;

#[derive(Debug, Error)]
pub enum ExecutorError {
  #[error("packaging script exited with code {code:?}: {stderr}")]
  ScriptFailed { code: Option<i32>, stderr: String },

  #[error("package source not found at {0}")]
  MissingSource(PathBuf),

  #[error("io error: {0}")]
  Io(#[from] io::Error),

  #[error("failed to read dependency blob: {0}")]
  Store(#[from] StoreError),
}

/// Compiles one package.
///
/// Receives the blob of every direct dependency and returns the packed
/// compiled output. Implementations must be safe to call concurrently for
/// different packages.
pub trait Executor: Send + Sync + 'static {
  fn run_compile_action(
    &self,
    package: &Package,
    dependencies: &BTreeMap<String, BlobRef>,
    blobs: &BlobStore,
  ) -> impl Future<Output = Result<Vec<u8>, ExecutorError>> + Send;
}

/// Runs `packages/<name>/packaging` from an extracted release with `sh`.
///
/// Each compile gets a scratch directory:
/// - `src/`: copy of the package directory, the working directory
/// - `install/`: `BOSH_INSTALL_TARGET`, packed as the result
/// - `packages/<dependency>/`: unpacked dependency outputs
#[derive(Debug, Clone)]
pub struct ShellExecutor {
  release_root: PathBuf,
}

impl ShellExecutor {
  pub fn new(release_root: impl Into<PathBuf>) -> Self {
    Self {
      release_root: release_root.into(),
    }
  }
}

impl Executor for ShellExecutor {
  async fn run_compile_action(
    &self,
    package: &Package,
    dependencies: &BTreeMap<String, BlobRef>,
    blobs: &BlobStore,
  ) -> Result<Vec<u8>, ExecutorError> {
    let source = self.release_root.join("packages").join(&package.name);
    let dependencies = dependencies.clone();
    let blobs = blobs.clone();
    let scratch = blocking(move || Scratch::prepare(&source, &dependencies, &blobs)).await?;

    info!(package = %package.name, "running packaging script");

    let output = Command::new("sh")
      .arg("packaging")
      .current_dir(&scratch.compile_dir)
      .env("BOSH_COMPILE_TARGET", &scratch.compile_dir)
      .env("BOSH_INSTALL_TARGET", &scratch.install_dir)
      .env("BOSH_PACKAGES_DIR", &scratch.packages_dir)
      .env("BOSH_PACKAGE_NAME", &package.name)
      .output()
      .await?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
      debug!(package = %package.name, stderr = %stderr, "packaging script failed");
      return Err(ExecutorError::ScriptFailed {
        code: output.status.code(),
        stderr,
      });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
      debug!(package = %package.name, stdout = %stdout.trim(), "packaging output");
    }

    blocking(move || Ok(archive::pack_dir(&scratch.install_dir)?)).await
  }
}

/// Scratch tree of one compile, removed on drop.
struct Scratch {
  _root: tempfile::TempDir,
  compile_dir: PathBuf,
  install_dir: PathBuf,
  packages_dir: PathBuf,
}

impl Scratch {
  fn prepare(
    source: &Path,
    dependencies: &BTreeMap<String, BlobRef>,
    blobs: &BlobStore,
  ) -> Result<Self, ExecutorError> {
    if !source.is_dir() {
      return Err(ExecutorError::MissingSource(source.to_path_buf()));
    }

    let root = tempfile::Builder::new().prefix("microdeploy-compile-").tempdir()?;
    let compile_dir = root.path().join("src");
    let install_dir = root.path().join("install");
    let packages_dir = root.path().join("packages");

    copy_dir(source, &compile_dir)?;
    fs::create_dir_all(&install_dir)?;
    fs::create_dir_all(&packages_dir)?;

    for (name, blob) in dependencies {
      let bytes = blobs.get(&blob.blob_id)?;
      archive::unpack(&bytes, &packages_dir.join(name))?;
    }

    Ok(Self {
      _root: root,
      compile_dir,
      install_dir,
      packages_dir,
    })
  }
}

async fn blocking<T, F>(work: F) -> Result<T, ExecutorError>
where
  F: FnOnce() -> Result<T, ExecutorError> + Send + 'static,
  T: Send + 'static,
{
  tokio::task::spawn_blocking(work).await.map_err(io::Error::other)?
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
  for entry in WalkDir::new(from) {
    let entry = entry.map_err(io::Error::other)?;
    let rel = entry.path().strip_prefix(from).map_err(io::Error::other)?;
    let target = to.join(rel);
    if entry.file_type().is_dir() {
      fs::create_dir_all(&target)?;
    } else if entry.file_type().is_file() {
      fs::copy(entry.path(), &target)?;
    }
  }
  Ok(())
}
