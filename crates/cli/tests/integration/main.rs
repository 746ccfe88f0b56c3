//! CLI integration tests against an extracted release on disk.

mod common;
mod deploy_tests;
mod workspace_tests;
