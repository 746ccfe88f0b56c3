//! Shared fixtures: an extracted CPI release, a manifest and a fake executor.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use microdeploy_lib::compile::{Executor, ExecutorError};
use microdeploy_lib::manifest::DeploymentManifest;
use microdeploy_lib::release::{Package, Release, load_release};
use microdeploy_lib::store::{BlobRef, BlobStore};
use microdeploy_lib::util::archive;
use microdeploy_lib::workspace::Workspace;
use tempfile::TempDir;

pub const CPI_TEMPLATE: &str = r#"#!/bin/bash
GLOBAL_PROPERTY="$${p:fake_cpi_default_property}"
JOB_PROPERTY="$${p:fake_cpi_specified_property.second_level}"
IP="$${p:network.ip}"
exec "$BOSH_PACKAGES/compiled_package/bin/cpi" "$@"
"#;

pub const MANIFEST: &str = r#"
---
name: fake-deployment
cloud_provider:
  properties:
    fake_cpi_specified_property:
      second_level: fake_specified_property_value
"#;

/// Isolated release, manifest and home directories.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    let env = Self {
      temp: TempDir::new().unwrap(),
    };
    env.write_release();
    env.write_file("deployment/micro_deployment.yml", MANIFEST);
    env
  }

  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
  }

  pub fn release_dir(&self) -> PathBuf {
    self.temp.path().join("release")
  }

  pub fn manifest_path(&self) -> PathBuf {
    self.temp.path().join("deployment").join("micro_deployment.yml")
  }

  pub fn home(&self) -> PathBuf {
    self.temp.path().join("home")
  }

  fn write_release(&self) {
    self.write_file("release/release.yml", "name: fake-cpi-release\nversion: 0+dev.1\n");

    self.write_file("release/packages/dependency_package/spec", "name: dependency_package\n");
    self.write_file("release/packages/dependency_package/packaging", "echo dependency\n");
    self.write_file(
      "release/packages/compiled_package/spec",
      "name: compiled_package\ndependencies:\n- dependency_package\n",
    );
    self.write_file(
      "release/packages/compiled_package/packaging",
      "touch \"$BOSH_INSTALL_TARGET/compiled_file\"\n",
    );

    self.write_file(
      "release/jobs/cpi/spec",
      r#"---
name: cpi
templates:
  cpi.erb: bin/cpi
packages:
- compiled_package
properties:
  fake_cpi_default_property:
    default: fake_cpi_default_value
  fake_cpi_specified_property.second_level:
    description: set by the deployment manifest
"#,
    );
    self.write_file("release/jobs/cpi/templates/cpi.erb", CPI_TEMPLATE);
  }

  pub fn remove_job(&self, name: &str) {
    fs::remove_dir_all(self.release_dir().join("jobs").join(name)).unwrap();
  }

  pub fn release(&self) -> Release {
    load_release(&self.release_dir()).unwrap()
  }

  pub fn manifest(&self) -> DeploymentManifest {
    DeploymentManifest::load(&self.manifest_path()).unwrap()
  }

  pub fn workspace(&self) -> Workspace {
    Workspace::open(self.manifest_path().parent().unwrap(), &self.home()).unwrap()
  }
}

/// Produces `compiled_file` holding the package name and its dependencies.
#[derive(Default)]
pub struct FakeExecutor {
  calls: AtomicUsize,
  order: Mutex<Vec<String>>,
}

impl FakeExecutor {
  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn order(&self) -> Vec<String> {
    self.order.lock().unwrap().clone()
  }
}

impl Executor for FakeExecutor {
  async fn run_compile_action(
    &self,
    package: &Package,
    dependencies: &BTreeMap<String, BlobRef>,
    blobs: &BlobStore,
  ) -> Result<Vec<u8>, ExecutorError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.order.lock().unwrap().push(package.name.clone());

    for blob in dependencies.values() {
      blobs.get(&blob.blob_id)?;
    }

    let deps: Vec<&str> = dependencies.keys().map(String::as_str).collect();
    let content = format!("{} built with [{}]", package.name, deps.join(","));
    let files = BTreeMap::from([("compiled_file".to_string(), content.into_bytes())]);
    Ok(archive::pack_files(&files, |_| 0o644)?)
  }
}

/// Read a file out of a stored tar.gz blob.
pub fn blob_file(blobs: &BlobStore, blob: &BlobRef, path: &str) -> Option<String> {
  let bytes = blobs.get(&blob.blob_id).unwrap();
  archive::read_file(&bytes, path)
    .unwrap()
    .map(|content| String::from_utf8(content).unwrap())
}

/// Parsed index document from the workspace directory.
pub fn index_document(workspace: &Path, file: &str) -> serde_json::Value {
  let content = fs::read_to_string(workspace.join(file)).unwrap();
  serde_json::from_str(&content).unwrap()
}
