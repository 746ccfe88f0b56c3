//! Shared test helpers for CLI integration tests.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

const MANIFEST: &str = r#"---
name: fake-deployment
cloud_provider:
  properties:
    fake_cpi_specified_property:
      second_level: fake_specified_property_value
"#;

const CPI_JOB_SPEC: &str = r#"---
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
"#;

const CPI_TEMPLATE: &str = r#"#!/bin/bash
GLOBAL_PROPERTY="$${p:fake_cpi_default_property}"
JOB_PROPERTY="$${p:fake_cpi_specified_property.second_level}"
IP="$${p:network.ip}"
"#;

/// Isolated home, manifest, release and stemcell.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    let env = Self {
      temp: TempDir::new().unwrap(),
    };
    env.write_file("deployment/micro_deployment.yml", MANIFEST);
    env.write_file("stemcell.tgz", "fake stemcell");

    env.write_file("release/release.yml", "name: fake-cpi-release\n");
    env.write_file("release/packages/dependency_package/spec", "name: dependency_package\n");
    env.write_file(
      "release/packages/dependency_package/packaging",
      "echo dependency > \"$BOSH_INSTALL_TARGET/dependency_file\"\n",
    );
    env.write_file(
      "release/packages/compiled_package/spec",
      "name: compiled_package\ndependencies:\n- dependency_package\n",
    );
    env.write_file(
      "release/packages/compiled_package/packaging",
      "cp \"$BOSH_PACKAGES_DIR/dependency_package/dependency_file\" \"$BOSH_INSTALL_TARGET/compiled_file\"\n",
    );
    env.write_file("release/jobs/cpi/spec", CPI_JOB_SPEC);
    env.write_file("release/jobs/cpi/templates/cpi.erb", CPI_TEMPLATE);
    env
  }

  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
  }

  pub fn remove_job(&self, name: &str) {
    fs::remove_dir_all(self.release_dir().join("jobs").join(name)).unwrap();
  }

  pub fn home(&self) -> PathBuf {
    self.temp.path().join("home")
  }

  pub fn manifest_path(&self) -> PathBuf {
    self.temp.path().join("deployment").join("micro_deployment.yml")
  }

  pub fn release_dir(&self) -> PathBuf {
    self.temp.path().join("release")
  }

  pub fn stemcell(&self) -> PathBuf {
    self.temp.path().join("stemcell.tgz")
  }

  pub fn descriptor_path(&self) -> PathBuf {
    self.temp.path().join("deployment").join("deployment.json")
  }

  /// UUID recorded in `deployment.json` next to the manifest.
  pub fn current_uuid(&self) -> String {
    let content = fs::read_to_string(self.descriptor_path()).unwrap();
    let descriptor: serde_json::Value = serde_json::from_str(&content).unwrap();
    descriptor["uuid"].as_str().unwrap().to_string()
  }

  pub fn current_workspace(&self) -> PathBuf {
    self.home().join(self.current_uuid())
  }

  pub fn microdeploy_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("microdeploy");
    cmd.env("MICRODEPLOY_HOME", self.home());
    cmd.env_remove("RUST_LOG");
    cmd
  }

  pub fn set_deployment(&self) {
    self
      .microdeploy_cmd()
      .arg("deployment")
      .arg(self.manifest_path())
      .assert()
      .success();
  }

  pub fn deploy(&self) -> Command {
    let mut cmd = self.microdeploy_cmd();
    cmd.arg("deploy").arg(self.release_dir()).arg(self.stemcell());
    cmd
  }
}
