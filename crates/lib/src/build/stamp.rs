//! Record of the last successful configure in a build directory.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::configure::Generator;
use crate::util::hash::Fingerprint;

pub const STAMP_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigureStamp {
  pub version: u32,
  pub fingerprint: Fingerprint,
  pub generator: Generator,
}

impl ConfigureStamp {
  pub fn new(fingerprint: Fingerprint, generator: Generator) -> Self {
    Self {
      version: STAMP_VERSION,
      fingerprint,
      generator,
    }
  }

  /// Read the stamp at `path`. Missing, unreadable or foreign stamps all
  /// count as "not configured".
  pub fn read(path: &Path) -> Option<Self> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Self>(&contents) {
      Ok(stamp) if stamp.version == STAMP_VERSION => Some(stamp),
      Ok(stamp) => {
        warn!(path = %path.display(), version = stamp.version, "ignoring stamp with unknown version");
        None
      }
      Err(e) => {
        warn!(path = %path.display(), error = %e, "ignoring unreadable configure stamp");
        None
      }
    }
  }

  pub fn write(&self, path: &Path) -> io::Result<()> {
    let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
    std::fs::write(path, json)
  }

  pub fn remove(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
      Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
      _ => Ok(()),
    }
  }
}
