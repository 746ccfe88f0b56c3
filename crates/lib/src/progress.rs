//! Per-item progress reporting for the compile and render stages.
//!
//! The library never prints. Front ends implement [`Progress`] to show which
//! package or job is being worked on while a deploy runs.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
  CompilingPackages,
  RenderingJobTemplates,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Stage::CompilingPackages => write!(f, "compiling packages"),
      Stage::RenderingJobTemplates => write!(f, "rendering job templates"),
    }
  }
}

/// Receives stage events as they happen.
///
/// Calls arrive from worker tasks, possibly concurrently. `started` is only
/// sent for items that are actually built; cache hits go straight to `cached`.
pub trait Progress: Send + Sync {
  fn started(&self, _stage: Stage, _item: &str) {}

  fn finished(&self, _stage: Stage, _item: &str) {}

  fn cached(&self, _stage: Stage, _item: &str) {}

  fn failed(&self, _stage: Stage, _item: &str, _error: &str) {}
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Progress for Silent {}
