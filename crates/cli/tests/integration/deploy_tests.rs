use std::fs;

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn release_without_cpi_job_exits_with_status_one() {
  let env = TestEnv::new();
  env.remove_job("cpi");
  env.set_deployment();

  env
    .deploy()
    .assert()
    .code(1)
    .stderr(predicate::str::contains("is not a valid CPI release"));

  let index = env.current_workspace().join("compiled_packages.json");
  assert!(!index.exists());
}

#[test]
fn invalid_release_after_clean_leaves_nothing_behind() {
  let env = TestEnv::new();
  env.set_deployment();
  env.microdeploy_cmd().args(["clean", "--force"]).assert().success();
  env.remove_job("cpi");

  env
    .deploy()
    .assert()
    .code(1)
    .stderr(predicate::str::contains("is not a valid CPI release"));

  assert!(!env.descriptor_path().exists());
  let home_entries: Vec<String> = fs::read_dir(env.home())
    .unwrap()
    .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
    .collect();
  assert_eq!(home_entries, vec!["config.json"]);
}

#[test]
fn deploy_without_deployment_fails() {
  let env = TestEnv::new();

  env
    .deploy()
    .assert()
    .code(1)
    .stderr(predicate::str::contains("No deployment set"));
}

#[test]
fn deploy_with_missing_stemcell_fails() {
  let env = TestEnv::new();
  env.set_deployment();
  fs::remove_file(env.stemcell()).unwrap();

  env
    .deploy()
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Stemcell not found"));
}

#[cfg(unix)]
#[test]
fn deploy_compiles_and_renders_into_the_workspace() {
  let env = TestEnv::new();
  env.set_deployment();

  env
    .deploy()
    .assert()
    .success()
    .stdout(predicate::str::contains("Started compiling packages > dependency_package"))
    .stdout(predicate::str::contains("Started compiling packages > compiled_package"))
    .stdout(predicate::str::contains("Started rendering job templates > cpi"))
    .stdout(predicate::str::contains("Deploy complete"));

  let workspace = env.current_workspace();
  let index: serde_json::Value =
    serde_json::from_str(&fs::read_to_string(workspace.join("compiled_packages.json")).unwrap()).unwrap();
  let entries = index.as_array().unwrap();
  assert_eq!(entries.len(), 2);
  assert_eq!(entries[0]["key"]["name"], "dependency_package");
  assert_eq!(entries[1]["key"]["name"], "compiled_package");

  for entry in entries {
    let blob_id = entry["value"]["blob_id"].as_str().unwrap();
    assert!(workspace.join("blobs").join(blob_id).is_file());
  }

  let templates: serde_json::Value =
    serde_json::from_str(&fs::read_to_string(workspace.join("templates.json")).unwrap()).unwrap();
  assert_eq!(templates[0]["key"]["name"], "cpi");
}

#[cfg(unix)]
#[test]
fn second_deploy_uses_cached_artifacts() {
  let env = TestEnv::new();
  env.set_deployment();
  env.deploy().assert().success();

  env
    .deploy()
    .assert()
    .success()
    .stdout(predicate::str::contains("Skipped compiling packages > compiled_package (cached)"))
    .stdout(predicate::str::contains("Skipped rendering job templates > cpi (cached)"))
    .stdout(predicate::str::contains("Started").not());
}

#[cfg(unix)]
#[test]
fn failing_packaging_script_exits_with_status_two() {
  let env = TestEnv::new();
  env.write_file("release/packages/dependency_package/packaging", "echo no >&2\nexit 7\n");
  env.set_deployment();

  env
    .deploy()
    .assert()
    .code(2)
    .stdout(predicate::str::contains("Started compiling packages > dependency_package"))
    .stdout(predicate::str::contains("Failed compiling packages > dependency_package"))
    .stdout(predicate::str::contains("compiled_package").not())
    .stderr(predicate::str::contains("dependency_package"));
}

#[cfg(unix)]
#[test]
fn json_output_reports_compiled_packages() {
  let env = TestEnv::new();
  env.set_deployment();

  env
    .deploy()
    .args(["-o", "json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"compiled\""))
    .stdout(predicate::str::contains("\"dependency_package\""));
}
