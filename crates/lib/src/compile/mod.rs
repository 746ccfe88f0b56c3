//! Package compilation in dependency order with fingerprint caching.
//!
//! Packages are grouped into waves by [`PackageGraph::waves`]. Each wave runs
//! its cache misses in parallel, bounded by [`CompileConfig::parallelism`];
//! a wave starts only after the previous one has recorded every blob.

mod dag;
mod executor;
mod types;

pub use dag::PackageGraph;
pub use executor::{Executor, ExecutorError, ShellExecutor};
pub use types::*;

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::progress::{Progress, Stage};
use crate::release::Package;
use crate::store::{BlobRef, BlobStore, Index, PackageKey, RecordOutcome};

type TaskResult = (String, Result<BlobRef, CompileError>);

/// Compile every package of `graph`, reusing blobs recorded in `index`.
///
/// A package whose `(name, fingerprint)` is already recorded never reaches
/// the executor. Freshly compiled output is stored and recorded before any
/// dependent starts. On failure, packages recorded so far stay in the index.
pub async fn compile_packages<E: Executor>(
  graph: &PackageGraph,
  blobs: &BlobStore,
  index: &Arc<Index<PackageKey>>,
  executor: Arc<E>,
  config: &CompileConfig,
  progress: Arc<dyn Progress>,
) -> Result<CompiledPackages, CompileError> {
  if let Some(cycle) = graph.detect_cycle() {
    return Err(CompileError::DependencyCycle { cycle });
  }

  let fingerprints = graph.fingerprints()?;
  let waves = graph.waves()?;
  info!(packages = graph.len(), waves = waves.len(), "compiling packages");

  let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));
  let mut result = CompiledPackages::default();

  for (wave_idx, wave) in waves.into_iter().enumerate() {
    debug!(wave = wave_idx, packages = wave.len(), "compiling wave");
    let mut join_set: JoinSet<TaskResult> = JoinSet::new();

    for name in wave {
      let Some(package) = graph.get(&name).cloned() else {
        continue;
      };
      let key = PackageKey {
        name: name.clone(),
        fingerprint: fingerprints[&name].clone(),
      };

      if let Some(blob) = index.lookup(&key) {
        info!(package = %name, fingerprint = %key.fingerprint, "package cache hit");
        progress.cached(Stage::CompilingPackages, &name);
        result.blobs.insert(name.clone(), blob);
        result.cached.push(name);
        continue;
      }

      let dependencies = dependency_blobs(&package, &result.blobs);
      let executor = Arc::clone(&executor);
      let index = Arc::clone(index);
      let blobs = blobs.clone();
      let semaphore = Arc::clone(&semaphore);
      let progress = Arc::clone(&progress);

      join_set.spawn(async move {
        let outcome = async {
          let _permit = semaphore
            .acquire_owned()
            .await
            .map_err(|e| CompileError::Task(e.to_string()))?;
          progress.started(Stage::CompilingPackages, &package.name);
          compile_one(&package, key, &dependencies, &blobs, &index, executor.as_ref()).await
        }
        .await;
        match &outcome {
          Ok(_) => progress.finished(Stage::CompilingPackages, &package.name),
          Err(e) => progress.failed(Stage::CompilingPackages, &package.name, &e.to_string()),
        }
        (package.name, outcome)
      });
    }

    let mut compiled = Vec::new();
    let mut failures: BTreeMap<String, CompileError> = BTreeMap::new();
    let mut task_error = None;

    while let Some(joined) = join_set.join_next().await {
      match joined {
        Ok((name, Ok(blob))) => {
          result.blobs.insert(name.clone(), blob);
          compiled.push(name);
        }
        Ok((name, Err(e))) => {
          warn!(package = %name, error = %e, "package failed to compile");
          failures.insert(name, e);
        }
        Err(e) => task_error = Some(CompileError::Task(e.to_string())),
      }
    }

    if let Some((_, err)) = failures.into_iter().next() {
      return Err(err);
    }
    if let Some(err) = task_error {
      return Err(err);
    }

    compiled.sort();
    result.compiled.extend(compiled);
  }

  info!(
    compiled = result.compiled.len(),
    cached = result.cached.len(),
    "package compilation finished"
  );
  Ok(result)
}

async fn compile_one<E: Executor>(
  package: &Package,
  key: PackageKey,
  dependencies: &BTreeMap<String, BlobRef>,
  blobs: &BlobStore,
  index: &Index<PackageKey>,
  executor: &E,
) -> Result<BlobRef, CompileError> {
  info!(package = %package.name, fingerprint = %key.fingerprint, "compiling package");

  let bytes = executor
    .run_compile_action(package, dependencies, blobs)
    .await
    .map_err(|source| CompileError::Compilation {
      package: package.name.clone(),
      source,
    })?;

  let store_err = |source| CompileError::Store {
    package: package.name.clone(),
    source,
  };
  let stored = blobs.put(&bytes).map_err(store_err)?;
  let outcome = index.record(key, stored.clone()).map_err(store_err)?;
  if matches!(outcome, RecordOutcome::Existing(_)) {
    debug!(package = %package.name, "package already recorded");
  }
  let blob = outcome.recorded(stored);

  info!(package = %package.name, blob = %blob.blob_id, "compiled package");
  Ok(blob)
}

fn dependency_blobs(package: &Package, compiled: &BTreeMap<String, BlobRef>) -> BTreeMap<String, BlobRef> {
  package
    .dependencies
    .iter()
    .filter_map(|dep| compiled.get(dep).map(|blob| (dep.clone(), blob.clone())))
    .collect()
}
