//! Shared utilities.
//!
//! Hashing and the deterministic archive format used for stored artifacts.

pub mod archive;
pub mod hash;
