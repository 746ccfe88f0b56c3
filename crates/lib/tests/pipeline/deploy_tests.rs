use std::fs;
use std::sync::Arc;

use microdeploy_lib::consts::{COMPILED_PACKAGES_INDEX, TEMPLATES_INDEX};
use microdeploy_lib::deploy::{DeployConfig, DeployError, deploy};
use microdeploy_lib::manifest::DeploymentManifest;
use microdeploy_lib::release::ReleaseError;

use super::common::{FakeExecutor, TestEnv, blob_file, index_document};

#[tokio::test]
async fn packages_compile_in_dependency_order() {
  let env = TestEnv::new();
  let workspace = env.workspace();
  let executor = Arc::new(FakeExecutor::default());

  let result = deploy(
    &workspace,
    &env.release(),
    &env.manifest(),
    executor.clone(),
    &DeployConfig::default(),
  )
  .await
  .unwrap();

  assert_eq!(executor.order(), vec!["dependency_package", "compiled_package"]);
  assert_eq!(result.packages.compiled, vec!["dependency_package", "compiled_package"]);

  let index = index_document(workspace.path(), COMPILED_PACKAGES_INDEX);
  let entries = index.as_array().unwrap();
  assert_eq!(entries.len(), 2);
  assert_eq!(entries[0]["key"]["name"], "dependency_package");
  assert_eq!(entries[1]["key"]["name"], "compiled_package");

  let blob_id = entries[1]["value"]["blob_id"].as_str().unwrap();
  assert!(workspace.blobs().root().join(blob_id).is_file());
  let compiled = blob_file(workspace.blobs(), &result.packages.blobs["compiled_package"], "compiled_file").unwrap();
  assert_eq!(compiled, "compiled_package built with [dependency_package]");
}

#[tokio::test]
async fn second_deploy_reuses_every_artifact() {
  let env = TestEnv::new();
  let workspace = env.workspace();

  let first = deploy(
    &workspace,
    &env.release(),
    &env.manifest(),
    Arc::new(FakeExecutor::default()),
    &DeployConfig::default(),
  )
  .await
  .unwrap();
  let compiled_before = fs::read(workspace.path().join(COMPILED_PACKAGES_INDEX)).unwrap();
  let blob_count = workspace.blobs().list().unwrap().len();

  let executor = Arc::new(FakeExecutor::default());
  let second = deploy(
    &env.workspace(),
    &env.release(),
    &env.manifest(),
    executor.clone(),
    &DeployConfig::default(),
  )
  .await
  .unwrap();

  assert_eq!(executor.calls(), 0);
  assert!(second.packages.compiled.is_empty());
  assert_eq!(second.templates.cached, vec!["cpi"]);
  assert_eq!(first.packages.blobs, second.packages.blobs);
  assert_eq!(first.templates.blobs, second.templates.blobs);
  assert_eq!(fs::read(workspace.path().join(COMPILED_PACKAGES_INDEX)).unwrap(), compiled_before);
  assert_eq!(workspace.blobs().list().unwrap().len(), blob_count);
}

#[tokio::test]
async fn cpi_template_renders_defaults_overrides_and_network() {
  let env = TestEnv::new();
  let workspace = env.workspace();

  let result = deploy(
    &workspace,
    &env.release(),
    &env.manifest(),
    Arc::new(FakeExecutor::default()),
    &DeployConfig::default(),
  )
  .await
  .unwrap();

  let index = index_document(workspace.path(), TEMPLATES_INDEX);
  assert_eq!(index[0]["key"]["name"], "cpi");

  let rendered = blob_file(workspace.blobs(), &result.templates.blobs["cpi"], "bin/cpi").unwrap();
  assert!(rendered.contains(r#"GLOBAL_PROPERTY="fake_cpi_default_value""#));
  assert!(rendered.contains(r#"JOB_PROPERTY="fake_specified_property_value""#));
  assert!(rendered.contains(r#"IP="""#));
  assert!(rendered.contains(r#""$BOSH_PACKAGES/compiled_package/bin/cpi" "$@""#));
}

#[tokio::test]
async fn release_without_cpi_job_is_rejected_on_retry() {
  let env = TestEnv::new();
  let workspace = env.workspace();
  deploy(
    &workspace,
    &env.release(),
    &env.manifest(),
    Arc::new(FakeExecutor::default()),
    &DeployConfig::default(),
  )
  .await
  .unwrap();
  let compiled_before = fs::read(workspace.path().join(COMPILED_PACKAGES_INDEX)).unwrap();
  let templates_before = fs::read(workspace.path().join(TEMPLATES_INDEX)).unwrap();

  env.remove_job("cpi");
  let executor = Arc::new(FakeExecutor::default());
  let err = deploy(
    &env.workspace(),
    &env.release(),
    &env.manifest(),
    executor.clone(),
    &DeployConfig::default(),
  )
  .await
  .unwrap_err();

  assert!(matches!(err, DeployError::Release(ReleaseError::NotCpiRelease { .. })));
  assert!(err.to_string().contains("is not a valid CPI release"));
  assert_eq!(err.exit_code(), 1);
  assert_eq!(executor.calls(), 0);
  assert_eq!(fs::read(workspace.path().join(COMPILED_PACKAGES_INDEX)).unwrap(), compiled_before);
  assert_eq!(fs::read(workspace.path().join(TEMPLATES_INDEX)).unwrap(), templates_before);
}

#[tokio::test]
async fn override_change_rerenders_without_recompiling() {
  let env = TestEnv::new();
  let workspace = env.workspace();
  let first = deploy(
    &workspace,
    &env.release(),
    &env.manifest(),
    Arc::new(FakeExecutor::default()),
    &DeployConfig::default(),
  )
  .await
  .unwrap();

  let changed = DeploymentManifest::parse(
    "name: fake-deployment\ncloud_provider:\n  properties:\n    fake_cpi_specified_property:\n      second_level: changed\n",
  )
  .unwrap();
  let executor = Arc::new(FakeExecutor::default());
  let second = deploy(&workspace, &env.release(), &changed, executor.clone(), &DeployConfig::default())
    .await
    .unwrap();

  assert_eq!(executor.calls(), 0);
  assert_eq!(second.templates.rendered, vec!["cpi"]);
  assert_ne!(first.templates.blobs["cpi"], second.templates.blobs["cpi"]);
  assert_eq!(workspace.templates().len(), 2);

  let rendered = blob_file(workspace.blobs(), &second.templates.blobs["cpi"], "bin/cpi").unwrap();
  assert!(rendered.contains(r#"JOB_PROPERTY="changed""#));
}

#[tokio::test]
async fn per_job_override_leaves_other_jobs_cached() {
  let env = TestEnv::new();
  env.write_file(
    "release/jobs/registry/spec",
    "name: registry\ntemplates:\n  registry.erb: config/registry.env\nproperties:\n  fake_cpi_specified_property.second_level: {}\n",
  );
  env.write_file(
    "release/jobs/registry/templates/registry.erb",
    "VALUE=\"$${p:fake_cpi_specified_property.second_level}\"\n",
  );
  let workspace = env.workspace();
  let first = deploy(
    &workspace,
    &env.release(),
    &env.manifest(),
    Arc::new(FakeExecutor::default()),
    &DeployConfig::default(),
  )
  .await
  .unwrap();
  assert_eq!(first.templates.rendered, vec!["cpi", "registry"]);
  let registry_before = workspace
    .templates()
    .entries()
    .into_iter()
    .find(|entry| entry.key.name == "registry")
    .unwrap();

  let changed = DeploymentManifest::parse(
    r#"
name: fake-deployment
cloud_provider:
  properties:
    fake_cpi_specified_property:
      second_level: fake_specified_property_value
  jobs:
    cpi:
      properties:
        fake_cpi_specified_property:
          second_level: only_for_cpi
"#,
  )
  .unwrap();
  let second = deploy(
    &workspace,
    &env.release(),
    &changed,
    Arc::new(FakeExecutor::default()),
    &DeployConfig::default(),
  )
  .await
  .unwrap();

  assert_eq!(second.templates.rendered, vec!["cpi"]);
  assert_eq!(second.templates.cached, vec!["registry"]);
  assert_eq!(second.templates.blobs["registry"], registry_before.value);

  let registry_entries: Vec<_> = workspace
    .templates()
    .entries()
    .into_iter()
    .filter(|entry| entry.key.name == "registry")
    .collect();
  assert_eq!(registry_entries, vec![registry_before]);

  let cpi = blob_file(workspace.blobs(), &second.templates.blobs["cpi"], "bin/cpi").unwrap();
  assert!(cpi.contains(r#"JOB_PROPERTY="only_for_cpi""#));
  let registry = blob_file(workspace.blobs(), &second.templates.blobs["registry"], "config/registry.env").unwrap();
  assert_eq!(registry, "VALUE=\"fake_specified_property_value\"\n");
}

#[tokio::test]
async fn upstream_source_change_recompiles_dependents() {
  let env = TestEnv::new();
  let workspace = env.workspace();
  deploy(
    &workspace,
    &env.release(),
    &env.manifest(),
    Arc::new(FakeExecutor::default()),
    &DeployConfig::default(),
  )
  .await
  .unwrap();

  env.write_file("release/packages/dependency_package/packaging", "echo changed\n");
  let executor = Arc::new(FakeExecutor::default());
  deploy(
    &workspace,
    &env.release(),
    &env.manifest(),
    executor.clone(),
    &DeployConfig::default(),
  )
  .await
  .unwrap();

  assert_eq!(executor.order(), vec!["dependency_package", "compiled_package"]);
  assert_eq!(workspace.compiled_packages().len(), 4);
}

#[tokio::test]
async fn dependency_cycle_fails_the_deploy() {
  let env = TestEnv::new();
  env.write_file(
    "release/packages/dependency_package/spec",
    "name: dependency_package\ndependencies:\n- compiled_package\n",
  );
  let executor = Arc::new(FakeExecutor::default());

  let err = deploy(
    &env.workspace(),
    &env.release(),
    &env.manifest(),
    executor.clone(),
    &DeployConfig::default(),
  )
  .await
  .unwrap_err();

  assert!(err.to_string().contains("dependency cycle"));
  assert_eq!(err.exit_code(), 2);
  assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn unresolved_template_property_stores_nothing_for_the_job() {
  let env = TestEnv::new();
  env.write_file("deployment/micro_deployment.yml", "name: fake-deployment\n");
  let workspace = env.workspace();

  let err = deploy(
    &workspace,
    &env.release(),
    &env.manifest(),
    Arc::new(FakeExecutor::default()),
    &DeployConfig::default(),
  )
  .await
  .unwrap_err();

  assert!(err.to_string().contains("fake_cpi_specified_property.second_level"));
  assert!(workspace.templates().is_empty());
  assert_eq!(workspace.compiled_packages().len(), 2);
}
