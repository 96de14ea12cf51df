use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::build::process::ProcessOutput;
use crate::recipe::Requirement;

/// The two external phases of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
  Configure,
  Compile,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Configure => write!(f, "configure"),
      Self::Compile => write!(f, "compile"),
    }
  }
}

/// Lifecycle of one build invocation.
///
/// ```text
/// NotStarted -> Configuring -> Compiling -> Succeeded
///                    |             |
///                    +-> Failed <--+
/// ```
///
/// A reused configuration goes straight from `NotStarted` to `Compiling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
  NotStarted,
  Configuring,
  Compiling,
  Succeeded,
  Failed,
}

impl BuildState {
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Succeeded | Self::Failed)
  }

  pub fn can_transition_to(&self, next: BuildState) -> bool {
    use BuildState::*;
    matches!(
      (self, next),
      (NotStarted, Configuring)
        | (NotStarted, Compiling)
        | (NotStarted, Failed)
        | (Configuring, Compiling)
        | (Configuring, Failed)
        | (Compiling, Succeeded)
        | (Compiling, Failed)
    )
  }
}

impl fmt::Display for BuildState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::NotStarted => "not started",
      Self::Configuring => "configuring",
      Self::Compiling => "compiling",
      Self::Succeeded => "succeeded",
      Self::Failed => "failed",
    };
    write!(f, "{}", s)
  }
}

fn describe_exit(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("exit code {}", code),
    None => "terminated by signal".to_string(),
  }
}

fn captured(stdout: &str, stderr: &str) -> String {
  let mut out = String::new();
  if !stdout.is_empty() {
    out.push_str("\n--- stdout ---\n");
    out.push_str(stdout);
  }
  if !stderr.is_empty() {
    out.push_str("\n--- stderr ---\n");
    out.push_str(stderr);
  }
  out
}

/// Errors from the external build. None of them are retried.
#[derive(Debug, Error)]
pub enum BuildProcessError {
  #[error("{phase} phase failed ({}){}", describe_exit(.code), captured(.stdout, .stderr))]
  Failed {
    phase: Phase,
    code: Option<i32>,
    stdout: String,
    stderr: String,
  },

  #[error("failed to spawn {program} for the {phase} phase: {source}")]
  Spawn {
    phase: Phase,
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("{tool} not found for the {phase} phase; install it or point buildstage at it")]
  ToolNotFound { phase: Phase, tool: String },

  #[error("toolchain activation failed: {message}")]
  Toolchain { message: String },

  #[error("source directory {0} does not exist; fetch the sources first")]
  MissingSource(PathBuf),

  #[error("failed to prepare {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to fingerprint configuration: {0}")]
  Fingerprint(#[from] serde_json::Error),
}

impl BuildProcessError {
  /// The phase a process failure belongs to, if any. Toolchain activation
  /// counts as configure.
  pub fn phase(&self) -> Option<Phase> {
    match self {
      Self::Failed { phase, .. } | Self::Spawn { phase, .. } | Self::ToolNotFound { phase, .. } => Some(*phase),
      Self::Toolchain { .. } => Some(Phase::Configure),
      Self::MissingSource(_) | Self::Io { .. } | Self::Fingerprint(_) => None,
    }
  }
}

/// Result of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
  /// Every state the build passed through, starting at `NotStarted`.
  pub states: Vec<BuildState>,
  /// The existing configuration was reused and configure did not run.
  pub configure_reused: bool,
  /// Requirements the caller's package manager must provide.
  pub requirements: Vec<Requirement>,
  pub configure_output: Option<ProcessOutput>,
  pub compile_output: ProcessOutput,
}
