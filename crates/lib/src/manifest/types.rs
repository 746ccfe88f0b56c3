//! Deployment manifest document.
//!
//! ```yaml
//! name: fake-deployment
//! cloud_provider:
//!   properties: {...}          # overrides for every job
//!   jobs:
//!     cpi:
//!       properties: {...}      # per-job overrides, layered on top
//!       network: default
//! networks:
//!   - name: default
//!     ip: 10.0.0.10
//!     netmask: 255.255.255.0
//!     gateway: 10.0.0.1
//!     dns: [8.8.8.8]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::properties::PropertyTree;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentManifest {
  pub name: String,
  #[serde(default)]
  pub cloud_provider: CloudProvider,
  #[serde(default)]
  pub networks: Vec<Network>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudProvider {
  /// Overrides applied to every job.
  #[serde(default)]
  pub properties: PropertyTree,
  #[serde(default)]
  pub jobs: BTreeMap<String, JobSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSettings {
  #[serde(default)]
  pub properties: PropertyTree,
  /// Name of the network the job is bound to.
  #[serde(default)]
  pub network: Option<String>,
}

/// A named network. Every field besides `name` becomes a network value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
  pub name: String,
  #[serde(flatten)]
  pub values: Map<String, Value>,
}
