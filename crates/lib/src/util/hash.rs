//! Hashing for fingerprints and content verification.
//!
//! - `Fingerprint`: identity of a package or job, derived from its definition
//! - `ContentHash`: SHA-256 of stored bytes, checked on every blob read
//! - `hash_directory()`: digest of a package source tree

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

pub type HashError = serde_json::Error;

/// Deterministic identity of a package or job.
///
/// A lowercase 64-character SHA-256 hex string computed from the JSON
/// serialization of whatever defines the object. Never derived from timestamps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl std::fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<&str> for Fingerprint {
  fn from(value: &str) -> Self {
    Fingerprint(value.to_string())
  }
}

pub trait Hashable: Serialize {
  fn compute_fingerprint(&self) -> Result<Fingerprint, HashError> {
    let serialized = serde_json::to_string(self)?;
    Ok(Fingerprint(hash_bytes(serialized.as_bytes()).0))
  }
}

/// A full 64-character SHA256 hash of stored content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, thiserror::Error)]
pub enum DirHashError {
  #[error("failed to walk {}: {source}", path.display())]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Digest of a package source tree.
///
/// Every entry contributes its kind and relative path (forward slashes); files
/// add their length and bytes, symlinks their target. Timestamps and modes are
/// ignored.
pub fn hash_directory(root: &Path) -> Result<ContentHash, DirHashError> {
  let mut hasher = Sha256::new();

  for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
    let entry = entry.map_err(|source| DirHashError::Walk {
      path: root.to_path_buf(),
      source,
    })?;
    let path = entry.path();
    let relative = path.strip_prefix(root).unwrap_or(path).to_string_lossy().replace('\\', "/");
    let read_err = |source| DirHashError::Read {
      path: path.to_path_buf(),
      source,
    };

    let file_type = entry.file_type();
    if file_type.is_dir() {
      hasher.update(format!("dir {relative}\n"));
    } else if file_type.is_symlink() {
      let target = fs::read_link(path).map_err(read_err)?;
      hasher.update(format!("link {relative} {}\n", target.to_string_lossy()));
    } else if file_type.is_file() {
      let mut file = fs::File::open(path).map_err(read_err)?;
      let len = file.metadata().map_err(read_err)?.len();
      hasher.update(format!("file {relative} {len}\n"));
      io::copy(&mut file, &mut hasher).map_err(read_err)?;
    }
  }

  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(format!("{:x}", hasher.finalize()))
}
