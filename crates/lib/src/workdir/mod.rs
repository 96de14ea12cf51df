//! Work directory layout.
//!
//! ```text
//! <workdir>/
//!   source/              upstream checkout
//!   build/               CMake binary directory
//!     .buildstage-configured
//!   install/             CMAKE_INSTALL_PREFIX
//!   .buildstage.lock
//! ```

mod lock;

pub use lock::{LockMetadata, WorkdirLock, WorkdirLockError};

use std::path::{Path, PathBuf};

use crate::consts::{BUILD_SUBDIR, CONFIGURE_STAMP, INSTALL_SUBDIR, SOURCE_SUBDIR, WORKDIR_LOCK};
use crate::recipe::StageRoot;

/// A per-build work directory. Owned exclusively by one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workdir {
  root: PathBuf,
}

impl Workdir {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn source_dir(&self) -> PathBuf {
    self.root.join(SOURCE_SUBDIR)
  }

  pub fn build_dir(&self) -> PathBuf {
    self.root.join(BUILD_SUBDIR)
  }

  pub fn install_dir(&self) -> PathBuf {
    self.root.join(INSTALL_SUBDIR)
  }

  pub fn stamp_path(&self) -> PathBuf {
    self.build_dir().join(CONFIGURE_STAMP)
  }

  pub fn lock_path(&self) -> PathBuf {
    self.root.join(WORKDIR_LOCK)
  }

  /// Directory a staging rule reads from.
  pub fn stage_root(&self, root: StageRoot) -> PathBuf {
    match root {
      StageRoot::Source => self.source_dir(),
      StageRoot::Build => self.build_dir(),
      StageRoot::Install => self.install_dir(),
    }
  }

  /// Take the exclusive lock on this work directory.
  pub fn lock(&self, command: &str) -> Result<WorkdirLock, WorkdirLockError> {
    WorkdirLock::acquire(&self.root, command)
  }
}
