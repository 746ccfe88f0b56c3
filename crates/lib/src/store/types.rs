use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::hash::{ContentHash, Fingerprint};

/// Generated identifier of a stored blob. Not derived from the content.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlobId(pub String);

impl BlobId {
  pub fn generate() -> Self {
    BlobId(uuid::Uuid::new_v4().to_string())
  }
}

impl fmt::Display for BlobId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Index value: where an artifact lives and what its bytes hash to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
  pub blob_id: BlobId,
  pub digest: ContentHash,
}

/// Cache key of a compiled package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageKey {
  pub name: String,
  pub fingerprint: Fingerprint,
}

impl fmt::Display for PackageKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "package {}/{}", self.name, self.fingerprint)
  }
}

/// Cache key of a rendered job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateKey {
  pub name: String,
  pub fingerprint: Fingerprint,
}

impl fmt::Display for TemplateKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "job {}/{}", self.name, self.fingerprint)
  }
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("blob {0} not found")]
  BlobNotFound(BlobId),

  #[error("blob {blob_id} is corrupted: expected digest {expected}, got {actual}")]
  Integrity {
    blob_id: BlobId,
    expected: String,
    actual: String,
  },

  #[error("index {path} is not valid JSON: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize index: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("conflicting index entry for {key}: recorded {existing}, refusing {attempted}")]
  IndexConsistency {
    key: String,
    existing: String,
    attempted: String,
  },
}
