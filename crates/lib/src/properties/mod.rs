//! Property trees and per-job property resolution.
//!
//! Precedence, lowest to highest:
//! 1. the job's declared defaults
//! 2. manifest overrides for the job
//! 3. network-derived values under the reserved `network` root
//!
//! The `network` root is owned entirely by (3): whatever defaults or overrides
//! put there is discarded.

mod tree;

pub use tree::{PropertyError, PropertyTree};

use serde_json::Value;
use tracing::debug;

use crate::consts::{NETWORK_ROOT, STANDARD_NETWORK_KEYS};
use crate::release::Job;

/// Build the property tree `job` renders against.
///
/// Every standard network key and every key the job declares is present under
/// `network`, as the empty string when the network binding does not supply it.
/// Override paths the job never declared pass through untouched.
pub fn resolve(job: &Job, overrides: &PropertyTree, network: &PropertyTree) -> PropertyTree {
  let mut tree = job.defaults.clone();
  tree.merge(overrides);
  tree.remove(NETWORK_ROOT);

  let mut network_tree = network.clone();
  let declared = STANDARD_NETWORK_KEYS
    .iter()
    .map(|k| k.to_string())
    .chain(job.network_keys.iter().cloned());
  for key in declared {
    if network_tree.get(&key).is_none() {
      network_tree.set(&key, Value::String(String::new()));
    }
  }
  tree.set(NETWORK_ROOT, network_tree.into_value());

  debug!(job = %job.name, leaves = tree.leaf_paths().len(), "resolved job properties");
  tree
}
