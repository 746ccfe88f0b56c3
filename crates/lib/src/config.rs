//! User configuration kept in `<home>/config.json`.
//!
//! Only tracks which deployment manifest is current.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to write config {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
  /// Path of the current deployment manifest.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub deployment: Option<PathBuf>,
}

impl UserConfig {
  pub fn path(home: &Path) -> PathBuf {
    home.join(CONFIG_FILE)
  }

  /// Load the config under `home`. A missing file is the default config.
  pub fn load(home: &Path) -> Result<Self, ConfigError> {
    let path = Self::path(home);
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
      Err(source) => return Err(ConfigError::Read { path, source }),
    };
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
  }

  pub fn save(&self, home: &Path) -> Result<(), ConfigError> {
    let path = Self::path(home);
    let write_err = |source| ConfigError::Write {
      path: path.clone(),
      source,
    };

    fs::create_dir_all(home).map_err(write_err)?;
    let content = serde_json::to_string_pretty(self).map_err(|e| write_err(io::Error::other(e)))?;
    let temp_path = home.join(format!("{CONFIG_FILE}.tmp"));
    fs::write(&temp_path, content).map_err(write_err)?;
    fs::rename(&temp_path, &path).map_err(write_err)?;

    debug!(path = %path.display(), "saved config");
    Ok(())
  }
}
