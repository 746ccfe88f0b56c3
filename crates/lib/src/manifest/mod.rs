//! Deployment manifest: the source of per-job property overrides and network
//! values.

mod types;

pub use types::*;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::properties::PropertyTree;

#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to read manifest {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid manifest {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("job '{job}' is bound to unknown network '{network}'")]
  UnknownNetwork { job: String, network: String },
}

/// Per-job inputs to property resolution.
pub trait ManifestSource {
  /// Overrides for `job`; empty when the manifest says nothing about it.
  fn property_overrides_for(&self, job: &str) -> PropertyTree;

  /// Values placed under the `network` root for `job`; may be empty.
  fn network_values_for(&self, job: &str) -> PropertyTree;
}

impl DeploymentManifest {
  /// Read and check a YAML manifest.
  pub fn load(path: &Path) -> Result<Self, ManifestError> {
    let content = fs::read_to_string(path).map_err(|source| ManifestError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let manifest = Self::parse(&content).map_err(|source| ManifestError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    manifest.check_networks()?;

    debug!(deployment = %manifest.name, networks = manifest.networks.len(), "loaded manifest");
    Ok(manifest)
  }

  pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(content)
  }

  fn check_networks(&self) -> Result<(), ManifestError> {
    for (job, settings) in &self.cloud_provider.jobs {
      if let Some(network) = &settings.network
        && self.network(network).is_none()
      {
        return Err(ManifestError::UnknownNetwork {
          job: job.clone(),
          network: network.clone(),
        });
      }
    }
    Ok(())
  }

  pub fn network(&self, name: &str) -> Option<&Network> {
    self.networks.iter().find(|n| n.name == name)
  }

  /// The network `job` is bound to. Without an explicit binding, a manifest
  /// with exactly one network binds every job to it.
  fn bound_network(&self, job: &str) -> Option<&Network> {
    match self.cloud_provider.jobs.get(job).and_then(|s| s.network.as_deref()) {
      Some(name) => self.network(name),
      None if self.networks.len() == 1 => self.networks.first(),
      None => None,
    }
  }
}

impl ManifestSource for DeploymentManifest {
  fn property_overrides_for(&self, job: &str) -> PropertyTree {
    let mut overrides = self.cloud_provider.properties.clone();
    if let Some(settings) = self.cloud_provider.jobs.get(job) {
      overrides.merge(&settings.properties);
    }
    overrides
  }

  fn network_values_for(&self, job: &str) -> PropertyTree {
    self
      .bound_network(job)
      .map(|network| PropertyTree::from(network.values.clone()))
      .unwrap_or_default()
  }
}
