use crate::consts::APP_NAME;
use std::path::PathBuf;

/// Environment variable overriding the microdeploy home directory.
pub const HOME_ENV: &str = "MICRODEPLOY_HOME";

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  let userprofile = std::env::var("USERPROFILE").expect("USERPROFILE not set");
  PathBuf::from(userprofile)
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  let home = std::env::var("HOME").expect("HOME not set");
  PathBuf::from(home)
}

/// Returns the directory for data files for the application
#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  let appdata = std::env::var("APPDATA").expect("APPDATA not set");
  PathBuf::from(appdata).join(APP_NAME)
}

/// Returns the directory for data files for the application
#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  let data_home = std::env::var("XDG_DATA_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".local").join("share"));
  data_home.join(APP_NAME)
}

/// Root under which deployment workspaces and the user config live.
///
/// `MICRODEPLOY_HOME` wins over the platform data directory.
pub fn microdeploy_home() -> PathBuf {
  if let Ok(path) = std::env::var(HOME_ENV)
    && !path.is_empty()
  {
    return PathBuf::from(path);
  }
  data_dir()
}
