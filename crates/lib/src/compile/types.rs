//! Error, configuration and result types for package compilation.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::store::{BlobRef, StoreError};
use crate::util::hash::HashError;

use super::executor::ExecutorError;

#[derive(Debug, Error)]
pub enum CompileError {
  #[error("dependency cycle detected: {}", cycle.join(" -> "))]
  DependencyCycle { cycle: Vec<String> },

  #[error("package '{package}' depends on unknown package '{dependency}'")]
  UnknownDependency { package: String, dependency: String },

  #[error("package '{0}' is declared more than once")]
  DuplicatePackage(String),

  #[error("failed to compile package '{package}': {source}")]
  Compilation {
    package: String,
    #[source]
    source: ExecutorError,
  },

  #[error("failed to store compiled package '{package}': {source}")]
  Store {
    package: String,
    #[source]
    source: StoreError,
  },

  #[error("failed to compute package fingerprint: {0}")]
  Fingerprint(#[from] HashError),

  #[error("compile task failed: {0}")]
  Task(String),
}

#[derive(Debug, Clone)]
pub struct CompileConfig {
  /// Maximum number of packages compiled at once.
  pub parallelism: usize,
}

impl Default for CompileConfig {
  fn default() -> Self {
    Self { parallelism: 4 }
  }
}

/// Outcome of [`compile_packages`](super::compile_packages).
#[derive(Debug, Default, Clone, Serialize)]
pub struct CompiledPackages {
  /// Blob holding the compiled output of every package.
  pub blobs: BTreeMap<String, BlobRef>,
  /// Packages run through the executor, in compile order.
  pub compiled: Vec<String>,
  /// Packages served from the index.
  pub cached: Vec<String>,
}
