//! Two-phase CMake build.
//!
//! [`BuildInvoker::build`] runs `cmake` configure then `cmake --build` for a
//! [`ConfigurationMapping`] in a [`Workdir`]. A stamp in the build
//! directory records the configure fingerprint of the mapping that was last
//! configured successfully; a mapping whose configure inputs are unchanged
//! skips straight to the compile phase.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::build::process::{CommandSpec, ProcessOutput, ProcessRunner, SystemRunner};
use crate::build::stamp::ConfigureStamp;
use crate::build::toolchain::ToolchainScope;
use crate::build::{BuildOutcome, BuildProcessError, BuildState, Phase};
use crate::configure::ConfigurationMapping;
use crate::workdir::Workdir;

/// Overrides the cmake program.
pub const CMAKE_ENV: &str = "BUILDSTAGE_CMAKE";

/// Settings of the invoker itself, independent of any recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokerConfig {
  pub cmake: PathBuf,
  /// Worker count for `--parallel`; `None` lets the build tool decide.
  pub jobs: Option<usize>,
}

impl Default for InvokerConfig {
  fn default() -> Self {
    Self {
      cmake: PathBuf::from("cmake"),
      jobs: None,
    }
  }
}

impl InvokerConfig {
  /// Defaults, with `BUILDSTAGE_CMAKE` applied.
  pub fn from_env() -> Self {
    let mut config = Self::default();
    if let Some(cmake) = std::env::var_os(CMAKE_ENV).filter(|v| !v.is_empty()) {
      config.cmake = PathBuf::from(cmake);
    }
    config
  }
}

/// Records state transitions of one build.
#[derive(Debug)]
struct StateTracker {
  history: Vec<BuildState>,
}

impl StateTracker {
  fn new() -> Self {
    Self {
      history: vec![BuildState::NotStarted],
    }
  }

  fn current(&self) -> BuildState {
    self.history.last().copied().unwrap_or(BuildState::NotStarted)
  }

  fn advance(&mut self, next: BuildState) {
    let current = self.current();
    debug_assert!(current.can_transition_to(next), "{current} -> {next}");
    debug!(from = %current, to = %next, "build state");
    self.history.push(next);
  }

  fn fail(&mut self, err: BuildProcessError) -> BuildProcessError {
    if !self.current().is_terminal() {
      self.advance(BuildState::Failed);
    }
    error!(error = %err, "build failed");
    err
  }
}

pub struct BuildInvoker<R = SystemRunner> {
  runner: R,
  config: InvokerConfig,
}

impl BuildInvoker<SystemRunner> {
  pub fn new(config: InvokerConfig) -> Self {
    Self {
      runner: SystemRunner,
      config,
    }
  }
}

impl<R: ProcessRunner> BuildInvoker<R> {
  pub fn with_runner(runner: R, config: InvokerConfig) -> Self {
    Self { runner, config }
  }

  pub fn runner(&self) -> &R {
    &self.runner
  }

  pub fn config(&self) -> &InvokerConfig {
    &self.config
  }

  /// Configure (unless reusable) and compile, installing into the work
  /// directory's install tree.
  pub async fn build(&self, mapping: &ConfigurationMapping, workdir: &Workdir) -> Result<BuildOutcome, BuildProcessError> {
    let mut tracker = StateTracker::new();

    let source_dir = workdir.source_dir();
    if !source_dir.is_dir() {
      return Err(tracker.fail(BuildProcessError::MissingSource(source_dir)));
    }

    let fingerprint = mapping.configure_fingerprint().map_err(|e| tracker.fail(e.into()))?;
    let build_dir = workdir.build_dir();
    let stamp_path = workdir.stamp_path();

    // Held until this function returns, on every path.
    let toolchain = if mapping.activate_toolchain {
      ToolchainScope::activate(&self.runner, mapping.arch)
        .await
        .map_err(|e| tracker.fail(e))?
    } else {
      ToolchainScope::inactive()
    };

    let reusable = match ConfigureStamp::read(&stamp_path) {
      Some(stamp) if stamp.fingerprint == fingerprint && stamp.generator == mapping.generator => true,
      Some(stamp) if stamp.generator != mapping.generator => {
        info!(
          from = %stamp.generator,
          to = %mapping.generator,
          "generator changed; resetting build directory"
        );
        reset_dir(&build_dir).await.map_err(|e| tracker.fail(e))?;
        false
      }
      _ => false,
    };

    create_dir(&build_dir).await.map_err(|e| tracker.fail(e))?;
    create_dir(&workdir.install_dir()).await.map_err(|e| tracker.fail(e))?;

    let configure_output = if reusable {
      info!(fingerprint = %fingerprint.short(), "reusing existing configuration");
      None
    } else {
      tracker.advance(BuildState::Configuring);
      ConfigureStamp::remove(&stamp_path).map_err(|source| {
        tracker.fail(BuildProcessError::Io {
          path: stamp_path.clone(),
          source,
        })
      })?;

      let spec = toolchain.apply(self.configure_command(mapping, workdir));
      info!(generator = %mapping.generator, build_dir = %build_dir.display(), "configuring");
      let output = self
        .run_phase(Phase::Configure, &spec)
        .await
        .map_err(|e| tracker.fail(e))?;

      ConfigureStamp::new(fingerprint.clone(), mapping.generator)
        .write(&stamp_path)
        .map_err(|source| {
          tracker.fail(BuildProcessError::Io {
            path: stamp_path.clone(),
            source,
          })
        })?;
      Some(output)
    };

    tracker.advance(BuildState::Compiling);
    let spec = toolchain.apply(self.compile_command(mapping, workdir));
    info!(build_type = %mapping.build_type, parallel = mapping.parallel, "compiling");
    let compile_output = self
      .run_phase(Phase::Compile, &spec)
      .await
      .map_err(|e| tracker.fail(e))?;

    tracker.advance(BuildState::Succeeded);
    info!(install_dir = %workdir.install_dir().display(), "build succeeded");

    Ok(BuildOutcome {
      states: tracker.history,
      configure_reused: reusable,
      requirements: mapping.requirements.clone(),
      configure_output,
      compile_output,
    })
  }

  /// `cmake -S <source> -B <build> -G <generator> -DCMAKE_INSTALL_PREFIX=<install> -D...`
  pub fn configure_command(&self, mapping: &ConfigurationMapping, workdir: &Workdir) -> CommandSpec {
    CommandSpec::new(&self.config.cmake)
      .arg("-S")
      .path_arg(&workdir.source_dir())
      .arg("-B")
      .path_arg(&workdir.build_dir())
      .arg("-G")
      .arg(mapping.generator.cmake_name())
      .arg(format!("-DCMAKE_INSTALL_PREFIX={}", workdir.install_dir().display()))
      .args(mapping.definitions())
      .cwd(workdir.build_dir())
      .envs(&mapping.environment)
  }

  /// `cmake --build <build> --config <type> --target install --parallel [N]`
  pub fn compile_command(&self, mapping: &ConfigurationMapping, workdir: &Workdir) -> CommandSpec {
    let spec = CommandSpec::new(&self.config.cmake)
      .arg("--build")
      .path_arg(&workdir.build_dir())
      .args(["--config", mapping.build_type.as_str(), "--target", "install", "--parallel"])
      .cwd(workdir.build_dir());

    match (mapping.parallel, self.config.jobs) {
      (false, _) => spec.arg("1"),
      (true, Some(jobs)) => spec.arg(jobs.to_string()),
      (true, None) => spec,
    }
  }

  async fn run_phase(&self, phase: Phase, spec: &CommandSpec) -> Result<ProcessOutput, BuildProcessError> {
    debug!(phase = %phase, command = %spec.display(), "running");

    let output = self.runner.run(spec).await.map_err(|source| {
      if source.kind() == io::ErrorKind::NotFound {
        BuildProcessError::ToolNotFound {
          phase,
          tool: spec.program.display().to_string(),
        }
      } else {
        BuildProcessError::Spawn {
          phase,
          program: spec.program_name(),
          source,
        }
      }
    })?;

    if !output.success() {
      return Err(BuildProcessError::Failed {
        phase,
        code: output.code,
        stdout: output.stdout,
        stderr: output.stderr,
      });
    }

    Ok(output)
  }
}

async fn create_dir(path: &Path) -> Result<(), BuildProcessError> {
  tokio::fs::create_dir_all(path).await.map_err(|source| BuildProcessError::Io {
    path: path.to_path_buf(),
    source,
  })
}

async fn reset_dir(path: &Path) -> Result<(), BuildProcessError> {
  match tokio::fs::remove_dir_all(path).await {
    Err(source) if source.kind() != io::ErrorKind::NotFound => Err(BuildProcessError::Io {
      path: path.to_path_buf(),
      source,
    }),
    _ => Ok(()),
  }
}
