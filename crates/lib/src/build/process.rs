//! External process execution.
//!
//! Every process the build spawns goes through a [`ProcessRunner`], so tests
//! can script cmake, vswhere and vcvarsall without installing them.

use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

/// A fully described command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
  pub program: PathBuf,
  pub args: Vec<String>,
  pub cwd: Option<PathBuf>,
  /// Variables added to (not replacing) the inherited environment.
  pub env: BTreeMap<String, String>,
}

impl CommandSpec {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      ..Default::default()
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn path_arg(self, path: &Path) -> Self {
    self.arg(path.display().to_string())
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }

  pub fn envs<'a, I>(mut self, vars: I) -> Self
  where
    I: IntoIterator<Item = (&'a String, &'a String)>,
  {
    for (key, value) in vars {
      self.env.insert(key.clone(), value.clone());
    }
    self
  }

  /// Program name without directories, for messages.
  pub fn program_name(&self) -> String {
    self
      .program
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| self.program.display().to_string())
  }

  /// Shell-like rendering for logs.
  pub fn display(&self) -> String {
    let mut out = self.program.display().to_string();
    for arg in &self.args {
      out.push(' ');
      if arg.contains(' ') {
        out.push('"');
        out.push_str(arg);
        out.push('"');
      } else {
        out.push_str(arg);
      }
    }
    out
  }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
  /// Exit code; `None` when terminated by a signal.
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl ProcessOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

/// Runs external commands to completion, capturing their output.
pub trait ProcessRunner {
  fn run(&self, spec: &CommandSpec) -> impl Future<Output = io::Result<ProcessOutput>> + Send;
}

/// Runs commands as real child processes via tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
  async fn run(&self, spec: &CommandSpec) -> io::Result<ProcessOutput> {
    let mut command = Command::new(&spec.program);
    command.args(&spec.args).envs(&spec.env).kill_on_drop(true);
    if let Some(cwd) = &spec.cwd {
      command.current_dir(cwd);
    }

    debug!(command = %spec.display(), cwd = ?spec.cwd, "spawning process");
    let output = command.output().await?;

    let result = ProcessOutput {
      code: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !result.stdout.is_empty() {
      debug!(stdout = %result.stdout, "process stdout");
    }
    if !result.stderr.is_empty() {
      debug!(stderr = %result.stderr, "process stderr");
    }

    Ok(result)
  }
}
