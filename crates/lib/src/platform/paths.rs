use std::path::PathBuf;

use crate::consts::APP_NAME;

/// Returns the user's home directory, falling back to the current directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  std::env::var_os("USERPROFILE")
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the user's home directory, falling back to the current directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  std::env::var_os("HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the directory for cache files for the application
#[cfg(windows)]
pub fn cache_dir() -> PathBuf {
  std::env::var_os("LOCALAPPDATA")
    .map(PathBuf::from)
    .unwrap_or_else(home_dir)
    .join(APP_NAME)
    .join("Cache")
}

/// Returns the directory for cache files for the application
#[cfg(not(windows))]
pub fn cache_dir() -> PathBuf {
  let cache_home = std::env::var("XDG_CACHE_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".cache"));
  cache_home.join(APP_NAME)
}

/// Root under which per-build work directories are created.
///
/// `BUILDSTAGE_WORK_DIR` overrides the default of `<cache>/work`.
pub fn work_root() -> PathBuf {
  if let Ok(path) = std::env::var("BUILDSTAGE_WORK_DIR") {
    return PathBuf::from(path);
  }
  cache_dir().join("work")
}

/// Default work directory for a recipe, one per name and version.
pub fn default_workdir(name: &str, version: &str) -> PathBuf {
  work_root().join(format!("{}-{}", name, version))
}
