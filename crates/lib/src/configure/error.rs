use thiserror::Error;

use crate::platform::{CompilerKind, Os};

/// Rejection of an option set, recipe or platform before anything runs.
///
/// Every variant is produced without spawning a process, so an invalid
/// request never reaches the (long-running) external build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidConfigurationError {
  #[error("unknown option '{name}'")]
  UnknownOption { name: String },

  #[error("invalid value '{value}' for option '{name}': expected {expected}")]
  InvalidValue {
    name: String,
    value: String,
    expected: String,
  },

  #[error("option '{name}' is not supported on {os}")]
  UnsupportedOnPlatform { name: String, os: Os },

  #[error("{compiler} {version} is not supported (minimum version is {minimum})")]
  UnsupportedCompiler {
    compiler: CompilerKind,
    version: u32,
    minimum: u32,
  },

  #[error("compiler {compiler} is not available on {os}")]
  CompilerNotAvailable { compiler: CompilerKind, os: Os },

  #[error("{context} references undeclared option '{name}'")]
  UndeclaredOption { context: String, name: String },

  #[error("{context} requires '{name}' to be a boolean option")]
  NotABoolean { context: String, name: String },

  #[error("malformed option assignment '{0}': expected name=value")]
  MalformedAssignment(String),
}
