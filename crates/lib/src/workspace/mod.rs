//! Deployment workspace: a UUID-named directory under the microdeploy home
//! that owns the artifact indices and blobs of one deployment.
//!
//! ```text
//! <manifest dir>/deployment.json   # {"uuid": "..."}
//! <home>/<uuid>/
//! ├── .lock
//! ├── compiled_packages.json
//! ├── templates.json
//! └── blobs/
//! ```

mod gc;
mod lock;

pub use gc::{GcError, GcResult, GcStats};
pub use lock::{LockError, LockMetadata, WorkspaceLock};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::consts::{BLOBS_DIR, COMPILED_PACKAGES_INDEX, DEPLOYMENT_FILE, TEMPLATES_INDEX};
use crate::store::{BlobStore, Index, IndexEntry, PackageKey, StoreError, TemplateKey};

#[derive(Debug, Error)]
pub enum WorkspaceError {
  #[error("failed to read deployment descriptor {path}: {source}")]
  ReadDescriptor {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid deployment descriptor {path}: {source}")]
  ParseDescriptor {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to remove {path}: {source}")]
  Remove {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DeploymentDescriptor {
  uuid: String,
}

#[derive(Debug)]
pub struct Workspace {
  uuid: String,
  path: PathBuf,
  descriptor: PathBuf,
  blobs: BlobStore,
  compiled_packages: Arc<Index<PackageKey>>,
  templates: Arc<Index<TemplateKey>>,
}

impl Workspace {
  /// Open the workspace of the deployment described in `descriptor_dir`,
  /// creating the descriptor and workspace directory on first use.
  ///
  /// Index entries whose blob is missing are dropped and the index rewritten.
  pub fn open(descriptor_dir: &Path, home: &Path) -> Result<Self, WorkspaceError> {
    let descriptor = descriptor_dir.join(DEPLOYMENT_FILE);
    let uuid = match read_descriptor(&descriptor)? {
      Some(existing) => existing.uuid,
      None => {
        let created = DeploymentDescriptor {
          uuid: uuid::Uuid::new_v4().to_string(),
        };
        write_descriptor(&descriptor, &created)?;
        info!(uuid = %created.uuid, path = %descriptor.display(), "created deployment descriptor");
        created.uuid
      }
    };

    let path = home.join(&uuid);
    let blobs_dir = path.join(BLOBS_DIR);
    fs::create_dir_all(&blobs_dir).map_err(|source| WorkspaceError::Write {
      path: blobs_dir.clone(),
      source,
    })?;

    let blobs = BlobStore::new(blobs_dir);
    let compiled_packages = Index::load(path.join(COMPILED_PACKAGES_INDEX))?;
    let templates = Index::load(path.join(TEMPLATES_INDEX))?;
    repair(&compiled_packages, &blobs)?;
    repair(&templates, &blobs)?;

    info!(
      uuid = %uuid,
      path = %path.display(),
      compiled_packages = compiled_packages.len(),
      templates = templates.len(),
      "opened workspace"
    );

    Ok(Self {
      uuid,
      path,
      descriptor,
      blobs,
      compiled_packages: Arc::new(compiled_packages),
      templates: Arc::new(templates),
    })
  }

  /// Open the workspace only if `descriptor_dir` already has a descriptor.
  pub fn find(descriptor_dir: &Path, home: &Path) -> Result<Option<Self>, WorkspaceError> {
    match read_descriptor(&descriptor_dir.join(DEPLOYMENT_FILE))? {
      Some(_) => Self::open(descriptor_dir, home).map(Some),
      None => Ok(None),
    }
  }

  pub fn uuid(&self) -> &str {
    &self.uuid
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn blobs(&self) -> &BlobStore {
    &self.blobs
  }

  pub fn compiled_packages(&self) -> &Arc<Index<PackageKey>> {
    &self.compiled_packages
  }

  pub fn templates(&self) -> &Arc<Index<TemplateKey>> {
    &self.templates
  }

  /// Take the workspace's exclusive advisory lock.
  pub fn lock(&self, command: &str) -> Result<WorkspaceLock, LockError> {
    WorkspaceLock::acquire(&self.path, command)
  }

  /// Remove the workspace directory and the descriptor. Removing what is
  /// already gone succeeds.
  pub fn clean(&self) -> Result<(), WorkspaceError> {
    match fs::remove_dir_all(&self.path) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(source) => {
        return Err(WorkspaceError::Remove {
          path: self.path.clone(),
          source,
        });
      }
    }
    match fs::remove_file(&self.descriptor) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(source) => {
        return Err(WorkspaceError::Remove {
          path: self.descriptor.clone(),
          source,
        });
      }
    }

    info!(uuid = %self.uuid, "cleaned workspace");
    Ok(())
  }

  /// Delete blobs neither index references, plus leftover temp files.
  pub fn collect_garbage(&self, dry_run: bool) -> Result<GcResult, GcError> {
    gc::collect_garbage(self, dry_run)
  }
}

fn repair<K>(index: &Index<K>, blobs: &BlobStore) -> Result<(), StoreError>
where
  K: Serialize + serde::de::DeserializeOwned + Clone + PartialEq + std::fmt::Display,
{
  let dropped: Vec<IndexEntry<K>> = index.retain(|entry| blobs.contains(&entry.value.blob_id))?;
  for entry in &dropped {
    warn!(
      key = %entry.key,
      blob = %entry.value.blob_id,
      index = %index.path().display(),
      "dropping index entry whose blob is missing"
    );
  }
  Ok(())
}

fn read_descriptor(path: &Path) -> Result<Option<DeploymentDescriptor>, WorkspaceError> {
  let content = match fs::read_to_string(path) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(source) => {
      return Err(WorkspaceError::ReadDescriptor {
        path: path.to_path_buf(),
        source,
      });
    }
  };
  serde_json::from_str(&content)
    .map(Some)
    .map_err(|source| WorkspaceError::ParseDescriptor {
      path: path.to_path_buf(),
      source,
    })
}

fn write_descriptor(path: &Path, descriptor: &DeploymentDescriptor) -> Result<(), WorkspaceError> {
  let write_err = |source| WorkspaceError::Write {
    path: path.to_path_buf(),
    source,
  };
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(write_err)?;
  }

  let temp_path = path.with_extension("json.tmp");
  let content = serde_json::to_string_pretty(descriptor).map_err(|e| write_err(io::Error::other(e)))?;
  fs::write(&temp_path, content).map_err(write_err)?;
  fs::rename(&temp_path, path).map_err(write_err)
}
