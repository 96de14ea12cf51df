//! Platform context for a single build.
//!
//! A [`PlatformContext`] captures the operating system, architecture,
//! compiler and build type once at the start of a build. It is immutable
//! afterwards and is one of the two inputs to option translation.

pub mod arch;
pub mod compiler;
pub mod os;
pub mod paths;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use arch::Arch;
pub use compiler::{Compiler, CompilerKind};
pub use os::Os;

/// Errors raised while detecting or parsing platform settings.
#[derive(Debug, Error)]
pub enum PlatformError {
  #[error("unsupported operating system: {0}")]
  UnsupportedOs(String),

  #[error("unsupported architecture: {0}")]
  UnsupportedArch(String),

  #[error("unknown operating system '{0}' (expected linux, darwin or windows)")]
  UnknownOs(String),

  #[error("unknown architecture '{0}' (expected x86_64 or aarch64)")]
  UnknownArch(String),

  #[error("unknown compiler '{0}' (expected gcc, clang, apple-clang or visual-studio)")]
  UnknownCompiler(String),

  #[error("unknown build type '{0}' (expected Release, Debug, RelWithDebInfo or MinSizeRel)")]
  UnknownBuildType(String),

  #[error("failed to determine version of compiler '{program}': {message}")]
  CompilerVersion { program: String, message: String },
}

/// CMake build configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildType {
  #[default]
  Release,
  Debug,
  RelWithDebInfo,
  MinSizeRel,
}

impl BuildType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Release => "Release",
      Self::Debug => "Debug",
      Self::RelWithDebInfo => "RelWithDebInfo",
      Self::MinSizeRel => "MinSizeRel",
    }
  }
}

impl fmt::Display for BuildType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for BuildType {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "release" => Ok(Self::Release),
      "debug" => Ok(Self::Debug),
      "relwithdebinfo" => Ok(Self::RelWithDebInfo),
      "minsizerel" => Ok(Self::MinSizeRel),
      _ => Err(PlatformError::UnknownBuildType(s.to_string())),
    }
  }
}

/// Resolved settings of the machine a build runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformContext {
  pub os: Os,
  pub arch: Arch,
  pub compiler: Compiler,
  pub build_type: BuildType,
}

impl PlatformContext {
  pub fn new(os: Os, arch: Arch, compiler: Compiler, build_type: BuildType) -> Self {
    Self {
      os,
      arch,
      compiler,
      build_type,
    }
  }

  /// Detect the current platform, including the compiler.
  pub fn detect(build_type: BuildType) -> Result<Self, PlatformError> {
    let os = Os::current().ok_or_else(|| PlatformError::UnsupportedOs(std::env::consts::OS.to_string()))?;
    let arch = Arch::current().ok_or_else(|| PlatformError::UnsupportedArch(std::env::consts::ARCH.to_string()))?;
    let compiler = Compiler::detect(os)?;

    Ok(Self {
      os,
      arch,
      compiler,
      build_type,
    })
  }

  /// Returns the platform triple string (e.g., "x86_64-linux")
  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }
}

impl fmt::Display for PlatformContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({}, {})", self.triple(), self.compiler, self.build_type)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn platform_triple_format() {
    let platform = PlatformContext::new(
      Os::MacOs,
      Arch::Aarch64,
      Compiler::new(CompilerKind::AppleClang, 15),
      BuildType::Release,
    );
    assert_eq!(platform.triple(), "aarch64-darwin");

    let platform = PlatformContext::new(
      Os::Linux,
      Arch::X86_64,
      Compiler::new(CompilerKind::Gcc, 11),
      BuildType::Debug,
    );
    assert_eq!(platform.triple(), "x86_64-linux");
    assert_eq!(platform.to_string(), "x86_64-linux (gcc 11, Debug)");
  }

  #[test]
  fn build_type_parse() {
    assert_eq!("relwithdebinfo".parse::<BuildType>().unwrap(), BuildType::RelWithDebInfo);
    assert!("fast".parse::<BuildType>().is_err());
  }
}
