//! CLI smoke tests: every command parses, runs without panicking and exits
//! with the expected status.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn microdeploy_cmd(home: &TempDir) -> Command {
  let mut cmd = cargo_bin_cmd!("microdeploy");
  cmd.env("MICRODEPLOY_HOME", home.path());
  cmd.env_remove("RUST_LOG");
  cmd
}

#[test]
fn help_flag_works() {
  let home = TempDir::new().unwrap();
  microdeploy_cmd(&home)
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  let home = TempDir::new().unwrap();
  microdeploy_cmd(&home)
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("microdeploy"));
}

#[test]
fn subcommand_help_works() {
  let home = TempDir::new().unwrap();
  for cmd in &["deployment", "deploy", "clean", "gc"] {
    microdeploy_cmd(&home)
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

#[test]
fn deployment_without_current_deployment_fails() {
  let home = TempDir::new().unwrap();
  microdeploy_cmd(&home)
    .arg("deployment")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("No deployment set"));
}

#[test]
fn deployment_with_missing_manifest_fails() {
  let home = TempDir::new().unwrap();
  microdeploy_cmd(&home)
    .args(["deployment", "/nonexistent/manifest.yml"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Deployment manifest not found"));
}

#[test]
fn deploy_requires_release_and_stemcell_arguments() {
  let home = TempDir::new().unwrap();
  microdeploy_cmd(&home).arg("deploy").assert().failure();
}

#[test]
fn gc_without_deployment_fails() {
  let home = TempDir::new().unwrap();
  microdeploy_cmd(&home)
    .arg("gc")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("No deployment set"));
}
