//! Garbage collection of blobs no index references.
//!
//! Orphans come from deploys interrupted between storing a blob and recording
//! it, and from index entries dropped by repair. Leftover temp files from
//! interrupted writes are swept too.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::store::{BlobId, StoreError};

use super::Workspace;

#[derive(Debug, Error)]
pub enum GcError {
  #[error("failed to list blobs: {0}")]
  List(#[from] StoreError),
}

#[derive(Debug, Default, Serialize)]
pub struct GcStats {
  pub blobs_scanned: usize,
  pub blobs_deleted: usize,
  pub temp_files_deleted: usize,
  pub bytes_freed: u64,
}

#[derive(Debug, Serialize)]
pub struct GcResult {
  pub stats: GcStats,
  pub deleted_paths: Vec<PathBuf>,
  pub dry_run: bool,
}

pub(super) fn collect_garbage(workspace: &Workspace, dry_run: bool) -> Result<GcResult, GcError> {
  let live: HashSet<BlobId> = workspace
    .compiled_packages()
    .entries()
    .into_iter()
    .map(|e| e.value.blob_id)
    .chain(workspace.templates().entries().into_iter().map(|e| e.value.blob_id))
    .collect();
  debug!(count = live.len(), "collected live blobs");

  let blobs = workspace.blobs();
  let mut stats = GcStats::default();
  let mut deleted_paths = Vec::new();

  for id in blobs.list()? {
    stats.blobs_scanned += 1;
    if live.contains(&id) {
      continue;
    }

    let size = blobs.size(&id).unwrap_or(0);
    let path = blobs.root().join(&id.0);
    debug!(blob = %id, "removing unreferenced blob");

    if dry_run {
      stats.blobs_deleted += 1;
      stats.bytes_freed += size;
      deleted_paths.push(path);
      continue;
    }

    match blobs.remove(&id) {
      Ok(()) => {
        stats.blobs_deleted += 1;
        stats.bytes_freed += size;
        deleted_paths.push(path);
      }
      Err(e) => warn!(blob = %id, error = %e, "failed to delete blob"),
    }
  }

  for path in blobs.list_temp_files()? {
    let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    debug!(path = %path.display(), "removing leftover temp file");

    if dry_run {
      stats.temp_files_deleted += 1;
      stats.bytes_freed += size;
      deleted_paths.push(path);
      continue;
    }

    match fs::remove_file(&path) {
      Ok(()) => {
        stats.temp_files_deleted += 1;
        stats.bytes_freed += size;
        deleted_paths.push(path);
      }
      Err(e) => warn!(path = %path.display(), error = %e, "failed to delete temp file"),
    }
  }

  info!(
    blobs_deleted = stats.blobs_deleted,
    temp_files_deleted = stats.temp_files_deleted,
    bytes_freed = stats.bytes_freed,
    dry_run,
    "garbage collection complete"
  );

  Ok(GcResult {
    stats,
    deleted_paths,
    dry_run,
  })
}
