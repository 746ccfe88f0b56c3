use std::fs;

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn deployment_creates_descriptor_and_workspace() {
  let env = TestEnv::new();

  env
    .microdeploy_cmd()
    .arg("deployment")
    .arg(env.manifest_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("Deployment set to"));

  let uuid = env.current_uuid();
  assert!(env.home().join(&uuid).join("blobs").is_dir());

  env
    .microdeploy_cmd()
    .arg("deployment")
    .assert()
    .success()
    .stdout(predicate::str::contains(uuid.as_str()));
}

#[test]
fn uuid_is_stable_when_deployment_is_set_again() {
  let env = TestEnv::new();
  env.set_deployment();
  let first = env.current_uuid();

  env.set_deployment();

  assert_eq!(env.current_uuid(), first);
}

#[test]
fn clean_removes_workspace_and_is_idempotent() {
  let env = TestEnv::new();
  env.set_deployment();
  let workspace = env.current_workspace();

  env
    .microdeploy_cmd()
    .args(["clean", "--force"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Removed workspace"));
  assert!(!workspace.exists());

  env
    .microdeploy_cmd()
    .args(["clean", "--force"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing to clean"));
}

#[test]
fn clean_without_force_refuses_non_interactive() {
  let env = TestEnv::new();
  env.set_deployment();

  env
    .microdeploy_cmd()
    .arg("clean")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("--force"));
  assert!(env.current_workspace().exists());
}

#[test]
fn gc_removes_orphan_blobs() {
  let env = TestEnv::new();
  env.set_deployment();
  let blobs = env.current_workspace().join("blobs");
  fs::write(blobs.join("orphan-blob"), "orphan").unwrap();

  env
    .microdeploy_cmd()
    .args(["gc", "--dry-run"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Dry run"));
  assert!(blobs.join("orphan-blob").exists());

  env
    .microdeploy_cmd()
    .args(["gc", "-o", "json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"blobs_deleted\": 1"));
  assert!(!blobs.join("orphan-blob").exists());
}
