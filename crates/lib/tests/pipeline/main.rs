//! End-to-end tests of the deploy pipeline against an on-disk release.

mod common;
mod deploy_tests;
