//! microdeploy-lib: the compile-and-render engine behind `microdeploy`.
//!
//! A deploy takes an extracted CPI release and a deployment manifest through
//! four steps:
//! - `release::validate`: the release must carry a `cpi` job
//! - `compile`: packages in dependency order, cached by fingerprint
//! - `properties::resolve`: defaults, manifest overrides and network values
//! - `render`: job templates, cached by render fingerprint
//!
//! Every artifact lands in the deployment's `workspace` as a blob referenced
//! from a persisted index.

pub mod compile;
pub mod config;
pub mod consts;
pub mod deploy;
pub mod manifest;
pub mod platform;
pub mod progress;
pub mod properties;
pub mod release;
pub mod render;
pub mod store;
pub mod util;
pub mod workspace;
