use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::compile::PackageGraph;
use crate::properties::PropertyTree;
use crate::util::hash::{ContentHash, Fingerprint, HashError, Hashable};

/// A release package as declared in release metadata.
///
/// `source_digest` covers only the package's own files. The cache identity,
/// which also folds in every upstream package, is computed by [`PackageGraph`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
  pub name: String,
  pub source_digest: ContentHash,
  pub dependencies: BTreeSet<String>,
}

impl Package {
  pub fn new<I, S>(name: &str, source_digest: &str, dependencies: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      name: name.to_string(),
      source_digest: ContentHash(source_digest.to_string()),
      dependencies: dependencies.into_iter().map(Into::into).collect(),
    }
  }
}

/// One template file of a job: where it comes from, where it renders to, and
/// its source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateFile {
  pub source: String,
  pub destination: String,
  pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
  pub name: String,
  /// Sorted by source path.
  pub templates: Vec<TemplateFile>,
  pub defaults: PropertyTree,
  /// Extra keys injected under `network` besides the standard ones.
  pub network_keys: BTreeSet<String>,
  pub packages: BTreeSet<String>,
}

impl Hashable for Job {}

impl Job {
  /// Identity of the job definition: templates, defaults, network keys and
  /// packages.
  pub fn fingerprint(&self) -> Result<Fingerprint, HashError> {
    self.compute_fingerprint()
  }
}

/// An extracted release: its jobs and its package dependency graph.
#[derive(Debug, Clone)]
pub struct Release {
  pub name: String,
  pub version: Option<String>,
  pub jobs: Vec<Job>,
  pub packages: PackageGraph,
}

impl Release {
  pub fn job(&self, name: &str) -> Option<&Job> {
    self.jobs.iter().find(|j| j.name == name)
  }

  pub fn jobs(&self) -> &[Job] {
    &self.jobs
  }

  pub fn packages(&self) -> &PackageGraph {
    &self.packages
  }
}
