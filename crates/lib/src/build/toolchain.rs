//! Visual Studio toolchain activation.
//!
//! `vcvarsall.bat` only works by mutating the environment of the shell that
//! runs it. Instead of copying that into our own process, the batch file is
//! run once in a throwaway `cmd.exe`, its resulting environment is captured
//! with `set`, and the variables are applied as an overlay to the child
//! processes of one build. Dropping the [`ToolchainScope`] discards the
//! overlay; the orchestrator's environment is never touched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::build::{BuildProcessError, Phase};
use crate::build::process::{CommandSpec, ProcessRunner};
use crate::platform::Arch;

/// Overrides the located `vcvarsall.bat`.
pub const VCVARSALL_ENV: &str = "VCVARSALL";

const VSWHERE_RELATIVE: &str = r"Microsoft Visual Studio\Installer\vswhere.exe";
const VCVARSALL_RELATIVE: &str = r"VC\Auxiliary\Build\vcvarsall.bat";

/// Toolchain environment held for the duration of one build.
#[derive(Debug, Default)]
pub struct ToolchainScope {
  overlay: BTreeMap<String, String>,
  active: bool,
}

impl ToolchainScope {
  /// A scope that adds nothing.
  pub fn inactive() -> Self {
    Self::default()
  }

  /// Locate `vcvarsall.bat` and capture the environment it sets up for `arch`.
  pub async fn activate<R: ProcessRunner>(runner: &R, arch: Arch) -> Result<Self, BuildProcessError> {
    let vcvarsall = locate_vcvarsall(runner).await?;
    info!(vcvarsall = %vcvarsall.display(), arch = %arch, "activating Visual Studio toolchain");

    let script = format!("\"{}\" {} >nul && set", vcvarsall.display(), arch.vcvars_arg());
    let spec = CommandSpec::new("cmd.exe").args(["/d", "/s", "/c"]).arg(script);
    let output = runner.run(&spec).await.map_err(|e| BuildProcessError::Toolchain {
      message: format!("failed to run {}: {}", vcvarsall.display(), e),
    })?;

    if !output.success() {
      return Err(BuildProcessError::Toolchain {
        message: format!(
          "{} exited with {:?}\n{}{}",
          vcvarsall.display(),
          output.code,
          output.stdout,
          output.stderr
        ),
      });
    }

    let overlay = parse_environment(&output.stdout);
    if overlay.is_empty() {
      return Err(BuildProcessError::Toolchain {
        message: format!("{} produced no environment", vcvarsall.display()),
      });
    }

    debug!(variables = overlay.len(), "captured toolchain environment");
    Ok(Self { overlay, active: true })
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn vars(&self) -> &BTreeMap<String, String> {
    &self.overlay
  }

  /// Add the overlay to `spec`'s environment. Variables already set on the
  /// spec take precedence.
  pub fn apply(&self, mut spec: CommandSpec) -> CommandSpec {
    for (key, value) in &self.overlay {
      spec.env.entry(key.clone()).or_insert_with(|| value.clone());
    }
    spec
  }
}

impl Drop for ToolchainScope {
  fn drop(&mut self) {
    if self.active {
      debug!("releasing toolchain environment");
    }
  }
}

/// `VCVARSALL` when set, otherwise the latest installation reported by
/// `vswhere`.
async fn locate_vcvarsall<R: ProcessRunner>(runner: &R) -> Result<PathBuf, BuildProcessError> {
  if let Some(path) = std::env::var_os(VCVARSALL_ENV).map(PathBuf::from) {
    if path.is_file() {
      return Ok(path);
    }
    return Err(BuildProcessError::Toolchain {
      message: format!("{} points to missing file {}", VCVARSALL_ENV, path.display()),
    });
  }

  let vswhere = locate_vswhere().ok_or_else(|| BuildProcessError::ToolNotFound {
    phase: Phase::Configure,
    tool: "vswhere".to_string(),
  })?;

  let spec = CommandSpec::new(vswhere).args([
    "-latest",
    "-products",
    "*",
    "-requires",
    "Microsoft.VisualStudio.Component.VC.Tools.x86.x64",
    "-property",
    "installationPath",
  ]);
  let output = runner.run(&spec).await.map_err(|e| BuildProcessError::Toolchain {
    message: format!("failed to run vswhere: {}", e),
  })?;

  let installation = output.stdout.lines().map(str::trim).find(|l| !l.is_empty());
  match installation {
    Some(dir) if output.success() => Ok(Path::new(dir).join(VCVARSALL_RELATIVE)),
    _ => Err(BuildProcessError::Toolchain {
      message: "no Visual Studio installation with C++ tools found".to_string(),
    }),
  }
}

fn locate_vswhere() -> Option<PathBuf> {
  let installer = std::env::var_os("ProgramFiles(x86)")
    .map(|dir| PathBuf::from(dir).join(VSWHERE_RELATIVE))
    .filter(|path| path.is_file());
  installer.or_else(|| which::which("vswhere").ok())
}

/// Parse `set` output (`KEY=VALUE` per line).
///
/// `cmd.exe` also lists per-drive entries such as `=C:=C:\`; those and
/// lines without `=` are skipped.
pub fn parse_environment(output: &str) -> BTreeMap<String, String> {
  output
    .lines()
    .filter_map(|line| line.trim_end_matches('\r').split_once('='))
    .filter(|(key, _)| !key.is_empty())
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::build::process::ProcessOutput;
  use serial_test::serial;
  use std::io;
  use std::sync::Mutex;

  struct Recording {
    stdout: String,
    code: i32,
    calls: Mutex<Vec<CommandSpec>>,
  }

  impl Recording {
    fn new(stdout: &str, code: i32) -> Self {
      Self {
        stdout: stdout.to_string(),
        code,
        calls: Mutex::new(Vec::new()),
      }
    }
  }

  impl ProcessRunner for Recording {
    async fn run(&self, spec: &CommandSpec) -> io::Result<ProcessOutput> {
      self.calls.lock().unwrap().push(spec.clone());
      Ok(ProcessOutput {
        code: Some(self.code),
        stdout: self.stdout.clone(),
        stderr: String::new(),
      })
    }
  }

  #[test]
  fn parses_set_output() {
    let env = parse_environment("=C:=C:\\src\r\nINCLUDE=C:\\VC\\include\r\nPATH=C:\\VC\\bin;C:\\Windows\r\nnoise\r\n");

    assert_eq!(env.len(), 2);
    assert_eq!(env.get("INCLUDE").map(String::as_str), Some("C:\\VC\\include"));
    assert_eq!(env.get("PATH").map(String::as_str), Some("C:\\VC\\bin;C:\\Windows"));
  }

  #[test]
  fn overlay_does_not_replace_explicit_vars() {
    let mut overlay = BTreeMap::new();
    overlay.insert("PATH".to_string(), "C:\\VC\\bin".to_string());
    overlay.insert("LIB".to_string(), "C:\\VC\\lib".to_string());
    let scope = ToolchainScope { overlay, active: true };

    let mut spec = CommandSpec::new("cmake");
    spec.env.insert("PATH".to_string(), "mine".to_string());
    let spec = scope.apply(spec);

    assert_eq!(spec.env.get("PATH").map(String::as_str), Some("mine"));
    assert_eq!(spec.env.get("LIB").map(String::as_str), Some("C:\\VC\\lib"));
  }

  #[tokio::test]
  #[serial]
  async fn activate_captures_environment_without_touching_process_env() {
    let temp = tempfile::TempDir::new().unwrap();
    let vcvarsall = temp.path().join("vcvarsall.bat");
    std::fs::write(&vcvarsall, "@echo off\r\n").unwrap();

    let runner = Recording::new("INCLUDE=C:\\VC\\include\nBUILDSTAGE_VCVARS_PROBE=1\n", 0);
    let scope = temp_env::async_with_vars(
      [(VCVARSALL_ENV, Some(vcvarsall.to_str().unwrap()))],
      ToolchainScope::activate(&runner, Arch::X86_64),
    )
    .await
    .unwrap();

    assert!(scope.is_active());
    assert_eq!(scope.vars().get("BUILDSTAGE_VCVARS_PROBE").map(String::as_str), Some("1"));
    assert!(std::env::var("BUILDSTAGE_VCVARS_PROBE").is_err());

    let calls = runner.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].program, PathBuf::from("cmd.exe"));
    assert!(calls[0].args.last().unwrap().contains(" x64 >nul && set"));
  }

  #[tokio::test]
  #[serial]
  async fn activate_fails_when_vcvarsall_fails() {
    let temp = tempfile::TempDir::new().unwrap();
    let vcvarsall = temp.path().join("vcvarsall.bat");
    std::fs::write(&vcvarsall, "").unwrap();

    let runner = Recording::new("", 1);
    let result = temp_env::async_with_vars(
      [(VCVARSALL_ENV, Some(vcvarsall.to_str().unwrap()))],
      ToolchainScope::activate(&runner, Arch::X86_64),
    )
    .await;

    assert!(matches!(result, Err(BuildProcessError::Toolchain { .. })));
  }

  #[tokio::test]
  #[serial]
  async fn activate_rejects_missing_override() {
    let runner = Recording::new("", 0);
    let result = temp_env::async_with_vars(
      [(VCVARSALL_ENV, Some("/nonexistent/vcvarsall.bat"))],
      ToolchainScope::activate(&runner, Arch::X86_64),
    )
    .await;

    assert!(matches!(result, Err(BuildProcessError::Toolchain { .. })));
    assert!(runner.calls.lock().unwrap().is_empty());
  }
}
