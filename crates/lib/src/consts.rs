//! Names and file layout shared across the crate.

pub const APP_NAME: &str = "microdeploy";

/// Job every CPI release must contain.
pub const CPI_JOB_NAME: &str = "cpi";

/// Workspace descriptor written next to the deployment manifest.
pub const DEPLOYMENT_FILE: &str = "deployment.json";

pub const COMPILED_PACKAGES_INDEX: &str = "compiled_packages.json";
pub const TEMPLATES_INDEX: &str = "templates.json";
pub const BLOBS_DIR: &str = "blobs";

/// Reserved property root for network-derived values.
pub const NETWORK_ROOT: &str = "network";

/// Network keys injected for every job, even without a network binding.
pub const STANDARD_NETWORK_KEYS: &[&str] = &["ip", "netmask", "gateway"];
