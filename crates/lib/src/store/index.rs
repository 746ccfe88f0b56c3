//! Persisted key -> blob index.
//!
//! The whole document is held in memory and rewritten atomically on every
//! mutation. Cardinality is bounded by the release's package and job counts,
//! not by deployment history.

use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::types::{BlobRef, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry<K> {
  pub key: K,
  pub value: BlobRef,
}

/// What `record` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
  Inserted,
  /// An entry with the same content was already present and stays recorded.
  Existing(BlobRef),
}

impl RecordOutcome {
  /// The blob the index now holds for the key, given the one just offered.
  pub fn recorded(self, offered: BlobRef) -> BlobRef {
    match self {
      RecordOutcome::Inserted => offered,
      RecordOutcome::Existing(first) => first,
    }
  }
}

/// Insertion-ordered, first-writer-wins index persisted as a JSON array.
///
/// `record` calls are serialized by an internal mutex; lookups observe every
/// write that completed before them in this process.
#[derive(Debug)]
pub struct Index<K> {
  path: PathBuf,
  entries: Mutex<Vec<IndexEntry<K>>>,
}

impl<K> Index<K>
where
  K: Serialize + DeserializeOwned + Clone + PartialEq + Display,
{
  /// Load the index at `path`. A missing file is an empty index.
  pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
    let path = path.into();

    let entries = match fs::read_to_string(&path) {
      Ok(content) => serde_json::from_str(&content).map_err(|source| StoreError::Parse {
        path: path.clone(),
        source,
      })?,
      Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
      Err(source) => return Err(StoreError::Read { path, source }),
    };

    Ok(Self {
      path,
      entries: Mutex::new(entries),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn guard(&self) -> MutexGuard<'_, Vec<IndexEntry<K>>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Pure in-memory lookup.
  pub fn lookup(&self, key: &K) -> Option<BlobRef> {
    self.guard().iter().find(|e| &e.key == key).map(|e| e.value.clone())
  }

  /// Record `key -> value`.
  ///
  /// First writer wins: a value with the same digest as the recorded one is
  /// ignored, even under another blob id. A different digest for an existing
  /// key is an `IndexConsistency` error and nothing is written.
  pub fn record(&self, key: K, value: BlobRef) -> Result<RecordOutcome, StoreError> {
    let mut entries = self.guard();

    if let Some(existing) = entries.iter().find(|e| e.key == key) {
      if existing.value.digest == value.digest {
        return Ok(RecordOutcome::Existing(existing.value.clone()));
      }
      error!(key = %key, existing = %existing.value.digest, attempted = %value.digest, "index consistency fault");
      return Err(StoreError::IndexConsistency {
        key: key.to_string(),
        existing: format!("{} ({})", existing.value.blob_id, existing.value.digest),
        attempted: format!("{} ({})", value.blob_id, value.digest),
      });
    }

    entries.push(IndexEntry { key, value });
    if let Err(e) = persist(&self.path, &entries) {
      entries.pop();
      return Err(e);
    }

    debug!(index = %self.path.display(), entries = entries.len(), "recorded index entry");
    Ok(RecordOutcome::Inserted)
  }

  /// Snapshot of every entry in insertion order.
  pub fn entries(&self) -> Vec<IndexEntry<K>> {
    self.guard().clone()
  }

  pub fn len(&self) -> usize {
    self.guard().len()
  }

  pub fn is_empty(&self) -> bool {
    self.guard().is_empty()
  }

  /// Drop entries failing `keep`, persisting when anything changed.
  ///
  /// Returns the removed entries.
  pub fn retain(&self, mut keep: impl FnMut(&IndexEntry<K>) -> bool) -> Result<Vec<IndexEntry<K>>, StoreError> {
    let mut entries = self.guard();
    let (kept, removed): (Vec<_>, Vec<_>) = entries.drain(..).partition(|e| keep(e));
    *entries = kept;

    if !removed.is_empty() {
      persist(&self.path, &entries)?;
    }
    Ok(removed)
  }
}

/// Write to a temp file then rename, so readers never see a torn document.
fn persist<K: Serialize>(path: &Path, entries: &[IndexEntry<K>]) -> Result<(), StoreError> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(|source| StoreError::Write {
      path: parent.to_path_buf(),
      source,
    })?;
  }

  let content = serde_json::to_string_pretty(entries).map_err(StoreError::Serialize)?;
  let mut temp_name = path.as_os_str().to_owned();
  temp_name.push(".tmp");
  let temp_path = PathBuf::from(temp_name);

  fs::write(&temp_path, &content)
    .and_then(|_| fs::rename(&temp_path, path))
    .map_err(|source| StoreError::Write {
      path: path.to_path_buf(),
      source,
    })
}
