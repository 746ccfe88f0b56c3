//! Blob directory addressed by generated IDs.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::util::hash::{ContentHash, hash_bytes};

use super::types::{BlobId, BlobRef, StoreError};

const DIGEST_SUFFIX: &str = ".sha256";
const TEMP_PREFIX: &str = ".tmp-";

/// Opaque byte storage with a SHA-256 digest recorded per blob.
///
/// Cheap to clone: it only holds the directory path.
#[derive(Debug, Clone)]
pub struct BlobStore {
  root: PathBuf,
}

impl BlobStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn blob_path(&self, id: &BlobId) -> PathBuf {
    self.root.join(&id.0)
  }

  fn digest_path(&self, id: &BlobId) -> PathBuf {
    self.root.join(format!("{}{}", id.0, DIGEST_SUFFIX))
  }

  /// Store `bytes` under a freshly generated ID.
  ///
  /// The digest sidecar is moved into place before the content, so a blob that
  /// is visible under its ID always has a digest to verify against.
  pub fn put(&self, bytes: &[u8]) -> Result<BlobRef, StoreError> {
    fs::create_dir_all(&self.root).map_err(|source| StoreError::Write {
      path: self.root.clone(),
      source,
    })?;

    let blob_id = BlobId::generate();
    let digest = hash_bytes(bytes);

    let temp_digest = self.root.join(format!("{}{}{}", TEMP_PREFIX, blob_id.0, DIGEST_SUFFIX));
    let temp_blob = self.root.join(format!("{}{}", TEMP_PREFIX, blob_id.0));

    let result = write_synced(&temp_digest, digest.0.as_bytes())
      .and_then(|_| fs::rename(&temp_digest, self.digest_path(&blob_id)))
      .and_then(|_| write_synced(&temp_blob, bytes))
      .and_then(|_| fs::rename(&temp_blob, self.blob_path(&blob_id)));

    if let Err(source) = result {
      let _ = fs::remove_file(&temp_digest);
      let _ = fs::remove_file(&temp_blob);
      let _ = fs::remove_file(self.digest_path(&blob_id));
      return Err(StoreError::Write {
        path: self.blob_path(&blob_id),
        source,
      });
    }

    debug!(blob = %blob_id, digest = %digest, size = bytes.len(), "stored blob");
    Ok(BlobRef { blob_id, digest })
  }

  /// Read a blob and verify it against its recorded digest.
  pub fn get(&self, id: &BlobId) -> Result<Vec<u8>, StoreError> {
    let path = self.blob_path(id);
    let bytes = match fs::read(&path) {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StoreError::BlobNotFound(id.clone())),
      Err(source) => return Err(StoreError::Read { path, source }),
    };

    let expected = self.recorded_digest(id)?;
    let actual = hash_bytes(&bytes);
    if actual != expected {
      warn!(blob = %id, expected = %expected, actual = %actual, "blob digest mismatch");
      return Err(StoreError::Integrity {
        blob_id: id.clone(),
        expected: expected.0,
        actual: actual.0,
      });
    }

    Ok(bytes)
  }

  fn recorded_digest(&self, id: &BlobId) -> Result<ContentHash, StoreError> {
    let path = self.digest_path(id);
    match fs::read_to_string(&path) {
      Ok(content) => Ok(ContentHash(content.trim().to_string())),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::Integrity {
        blob_id: id.clone(),
        expected: "<missing digest>".to_string(),
        actual: "<unverifiable>".to_string(),
      }),
      Err(source) => Err(StoreError::Read { path, source }),
    }
  }

  pub fn contains(&self, id: &BlobId) -> bool {
    self.blob_path(id).is_file()
  }

  /// Size in bytes of a stored blob.
  pub fn size(&self, id: &BlobId) -> Result<u64, StoreError> {
    let path = self.blob_path(id);
    fs::metadata(&path)
      .map(|m| m.len())
      .map_err(|source| StoreError::Read { path, source })
  }

  /// IDs of every complete blob. Digest sidecars and temp files are skipped.
  pub fn list(&self) -> Result<Vec<BlobId>, StoreError> {
    let entries = match fs::read_dir(&self.root) {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(source) => {
        return Err(StoreError::Read {
          path: self.root.clone(),
          source,
        });
      }
    };

    let mut ids = Vec::new();
    for entry in entries {
      let entry = entry.map_err(|source| StoreError::Read {
        path: self.root.clone(),
        source,
      })?;
      let name = entry.file_name().to_string_lossy().to_string();
      if name.starts_with(TEMP_PREFIX) || name.ends_with(DIGEST_SUFFIX) {
        continue;
      }
      ids.push(BlobId(name));
    }
    ids.sort();
    Ok(ids)
  }

  /// Leftovers from writes that never completed.
  pub fn list_temp_files(&self) -> Result<Vec<PathBuf>, StoreError> {
    let entries = match fs::read_dir(&self.root) {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(source) => {
        return Err(StoreError::Read {
          path: self.root.clone(),
          source,
        });
      }
    };

    Ok(
      entries
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
        .map(|e| e.path())
        .collect(),
    )
  }

  /// Delete a blob and its digest. Only garbage collection calls this.
  pub fn remove(&self, id: &BlobId) -> Result<(), StoreError> {
    for path in [self.blob_path(id), self.digest_path(id)] {
      match fs::remove_file(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(StoreError::Write { path, source }),
      }
    }
    Ok(())
  }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
  let mut file = File::create(path)?;
  file.write_all(bytes)?;
  file.sync_all()
}
