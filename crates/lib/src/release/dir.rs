//! Loader for an extracted release directory.
//!
//! ```text
//! <release>/
//! ├── release.yml                 # name, version (optional)
//! ├── packages/<package>/
//! │   ├── spec                    # name, dependencies
//! │   └── packaging               # build script
//! └── jobs/<job>/
//!     ├── spec                    # name, templates, packages, properties, network
//!     └── templates/<source>
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::compile::PackageGraph;
use crate::properties::PropertyTree;
use crate::util::hash::hash_directory;

use super::{Job, Package, Release, ReleaseError, TemplateFile};

const RELEASE_FILE: &str = "release.yml";
const SPEC_FILE: &str = "spec";

#[derive(Debug, Default, Deserialize)]
struct ReleaseSpec {
  name: Option<String>,
  version: Option<serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
struct PackageSpec {
  name: String,
  #[serde(default)]
  dependencies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JobSpec {
  name: String,
  /// source file -> rendered destination
  #[serde(default)]
  templates: BTreeMap<String, String>,
  #[serde(default)]
  packages: Vec<String>,
  #[serde(default)]
  properties: BTreeMap<String, Option<PropertySpec>>,
  #[serde(default)]
  network: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PropertySpec {
  #[serde(default)]
  default: Option<serde_json::Value>,
}

/// Read an extracted release from `dir`.
pub fn load_release(dir: &Path) -> Result<Release, ReleaseError> {
  let release_spec: ReleaseSpec = match read_spec(&dir.join(RELEASE_FILE)) {
    Ok(spec) => spec,
    Err(ReleaseError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => ReleaseSpec::default(),
    Err(e) => return Err(e),
  };

  let name = release_spec.name.unwrap_or_else(|| {
    dir
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .unwrap_or_else(|| "release".to_string())
  });
  let version = release_spec.version.and_then(|v| match v {
    serde_yaml::Value::String(s) => Some(s),
    serde_yaml::Value::Number(n) => Some(n.to_string()),
    _ => None,
  });

  let mut packages = Vec::new();
  for package_dir in subdirectories(&dir.join("packages"))? {
    packages.push(load_package(&package_dir)?);
  }

  let mut jobs: Vec<Job> = Vec::new();
  for job_dir in subdirectories(&dir.join("jobs"))? {
    let job = load_job(&job_dir)?;
    if jobs.iter().any(|j| j.name == job.name) {
      return Err(ReleaseError::DuplicateJob(job.name));
    }
    jobs.push(job);
  }

  info!(release = %name, packages = packages.len(), jobs = jobs.len(), "loaded release");

  Ok(Release {
    name,
    version,
    jobs,
    packages: PackageGraph::new(packages)?,
  })
}

fn load_package(dir: &Path) -> Result<Package, ReleaseError> {
  let spec: PackageSpec = read_spec(&dir.join(SPEC_FILE))?;
  let source_digest = hash_directory(dir)?;
  debug!(package = %spec.name, digest = %source_digest, "loaded package");

  Ok(Package {
    name: spec.name,
    source_digest,
    dependencies: spec.dependencies.into_iter().collect(),
  })
}

fn load_job(dir: &Path) -> Result<Job, ReleaseError> {
  let spec: JobSpec = read_spec(&dir.join(SPEC_FILE))?;

  let mut templates = Vec::new();
  for (source, destination) in spec.templates {
    let path = dir.join("templates").join(&source);
    let content = fs::read_to_string(&path).map_err(|source| ReleaseError::Read { path, source })?;
    templates.push(TemplateFile {
      source,
      destination,
      content,
    });
  }

  let mut defaults = PropertyTree::new();
  for (path, property) in spec.properties {
    if let Some(default) = property.and_then(|p| p.default) {
      defaults.set(&path, default);
    }
  }

  debug!(job = %spec.name, templates = templates.len(), "loaded job");

  Ok(Job {
    name: spec.name,
    templates,
    defaults,
    network_keys: spec.network.into_iter().collect(),
    packages: spec.packages.into_iter().collect::<BTreeSet<_>>(),
  })
}

fn read_spec<T: DeserializeOwned>(path: &Path) -> Result<T, ReleaseError> {
  let content = fs::read_to_string(path).map_err(|source| ReleaseError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  serde_yaml::from_str(&content).map_err(|source| ReleaseError::Spec {
    path: path.to_path_buf(),
    source,
  })
}

/// Child directories sorted by name. A missing parent has none.
fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>, ReleaseError> {
  let entries = match fs::read_dir(dir) {
    Ok(entries) => entries,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(source) => {
      return Err(ReleaseError::Read {
        path: dir.to_path_buf(),
        source,
      });
    }
  };

  let mut dirs = Vec::new();
  for entry in entries {
    let entry = entry.map_err(|source| ReleaseError::Read {
      path: dir.to_path_buf(),
      source,
    })?;
    if entry.path().is_dir() {
      dirs.push(entry.path());
    }
  }
  dirs.sort();
  Ok(dirs)
}
