//! Release model, directory loader and validation.
//!
//! A release carries the jobs to render and the packages to compile. Archive
//! extraction happens before this crate sees a release; [`dir::load_release`]
//! reads the extracted tree.

pub mod dir;
mod types;
pub mod validate;

pub use dir::load_release;
pub use types::*;
pub use validate::validate;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::compile::CompileError;
use crate::util::hash::DirHashError;

#[derive(Debug, Error)]
pub enum ReleaseError {
  #[error("release '{release}' is not a valid CPI release: it has no '{job}' job")]
  NotCpiRelease { release: String, job: String },

  #[error("job '{job}' in release '{release}' uses unknown package '{package}'")]
  UnknownJobPackage {
    release: String,
    job: String,
    package: String,
  },

  #[error("duplicate job '{0}' in release")]
  DuplicateJob(String),

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid spec {path}: {source}")]
  Spec {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("failed to hash package source: {0}")]
  Hash(#[from] DirHashError),

  #[error("invalid package graph: {0}")]
  Packages(#[from] CompileError),
}
