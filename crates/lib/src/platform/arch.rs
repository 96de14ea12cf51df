use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::platform::PlatformError;

/// CPU architecture variants a build can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
  X86_64,
  Aarch64,
}

impl Arch {
  /// Detect the current CPU architecture at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86_64" => Some(Self::X86_64),
      "aarch64" => Some(Self::Aarch64),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this architecture
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X86_64 => "x86_64",
      Self::Aarch64 => "aarch64",
    }
  }

  /// Architecture argument understood by `vcvarsall.bat`
  pub fn vcvars_arg(&self) -> &'static str {
    match self {
      Self::X86_64 => "x64",
      Self::Aarch64 => "arm64",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Arch {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "x86_64" | "amd64" | "x64" => Ok(Self::X86_64),
      "aarch64" | "arm64" | "armv8" => Ok(Self::Aarch64),
      _ => Err(PlatformError::UnknownArch(s.to_string())),
    }
  }
}
