//! Release validation, run before anything touches the workspace.

use tracing::debug;

use crate::consts::CPI_JOB_NAME;

use super::{Release, ReleaseError};

/// Check that `release` can be deployed as a CPI release.
///
/// Fails when the `cpi` job is missing or a job uses a package the release does
/// not ship. Performs no I/O.
pub fn validate(release: &Release) -> Result<(), ReleaseError> {
  if release.job(CPI_JOB_NAME).is_none() {
    debug!(release = %release.name, "release has no cpi job");
    return Err(ReleaseError::NotCpiRelease {
      release: release.name.clone(),
      job: CPI_JOB_NAME.to_string(),
    });
  }

  for job in &release.jobs {
    if let Some(package) = job.packages.iter().find(|p| !release.packages.contains(p)) {
      return Err(ReleaseError::UnknownJobPackage {
        release: release.name.clone(),
        job: job.name.clone(),
        package: package.clone(),
      });
    }
  }

  debug!(release = %release.name, jobs = release.jobs.len(), "release is valid");
  Ok(())
}
