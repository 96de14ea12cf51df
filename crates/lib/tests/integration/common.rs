use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use buildstage_lib::build::{BuildInvoker, CommandSpec, InvokerConfig, ProcessOutput, ProcessRunner};
use buildstage_lib::pipeline::{Pipeline, SourceAcquirer};
use buildstage_lib::platform::{Arch, BuildType, Compiler, CompilerKind, Os, PlatformContext};
use buildstage_lib::source::{FetchedSource, SourceFetchError};

pub const COMMIT: &str = "6f3f1b1c0e3a9f4c2d1e0b9a8c7d6e5f4a3b2c1d";

/// Writes a small source tree instead of cloning. An existing tree is
/// reported as reused and left untouched.
#[derive(Default)]
pub struct FakeSource {
  pub files: Vec<(&'static str, &'static str)>,
  calls: AtomicUsize,
}

impl FakeSource {
  pub fn with_files(files: &[(&'static str, &'static str)]) -> Self {
    Self {
      files: files.to_vec(),
      calls: AtomicUsize::new(0),
    }
  }

  /// A tree the libtorch recipe can be built and staged from.
  pub fn libtorch() -> Self {
    Self::with_files(&[
      ("LICENSE", "From PyTorch:\n\nCopyright (c) 2016-     Facebook, Inc\n"),
      (
        "caffe2/CMakeLists.txt",
        "COMMAND --yaml_dir=${CMAKE_CURRENT_BINARY_DIR}/../aten/src/ATen\n",
      ),
      ("CMakeLists.txt", "project(Torch CXX C)\n"),
    ])
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl SourceAcquirer for FakeSource {
  fn acquire(&self, _url: &str, _tag: &str, dest: &Path) -> Result<FetchedSource, SourceFetchError> {
    self.calls.fetch_add(1, Ordering::SeqCst);

    let reused = dest.exists();
    if !reused {
      for (file, content) in &self.files {
        let path = dest.join(file);
        let parent = path.parent().unwrap_or(dest);
        std::fs::create_dir_all(parent).map_err(|e| SourceFetchError::CreateDir(parent.to_path_buf(), e))?;
        std::fs::write(&path, content).map_err(|source| SourceFetchError::PatchIo { path, source })?;
      }
    }

    Ok(FetchedSource {
      path: dest.to_path_buf(),
      commit: COMMIT.to_string(),
      reused,
    })
  }
}

/// Records every command. The compile phase "installs" a header, a
/// library and a tool into the install prefix passed at configure time.
#[derive(Default)]
pub struct ScriptedCmake {
  pub fail_phase: Option<&'static str>,
  calls: Mutex<Vec<CommandSpec>>,
  install_prefix: Mutex<Option<PathBuf>>,
}

impl ScriptedCmake {
  pub fn failing(phase_arg: &'static str) -> Self {
    Self {
      fail_phase: Some(phase_arg),
      ..Default::default()
    }
  }

  pub fn calls(&self) -> Vec<CommandSpec> {
    self.calls.lock().unwrap().clone()
  }

  pub fn configure_calls(&self) -> usize {
    self.calls().iter().filter(|c| c.args.iter().any(|a| a == "-S")).count()
  }

  fn install(&self) -> io::Result<()> {
    let Some(prefix) = self.install_prefix.lock().unwrap().clone() else {
      return Ok(());
    };
    std::fs::create_dir_all(prefix.join("include/torch"))?;
    std::fs::create_dir_all(prefix.join("lib"))?;
    std::fs::create_dir_all(prefix.join("bin"))?;
    std::fs::write(prefix.join("include/torch/torch.h"), "#pragma once\n")?;
    std::fs::write(prefix.join("lib/libc10.so"), "ELF")?;
    std::fs::write(prefix.join("lib/libtorch.so"), "ELF")?;
    std::fs::write(prefix.join("bin/torch_shm_manager"), "ELF")?;
    Ok(())
  }
}

impl ProcessRunner for ScriptedCmake {
  async fn run(&self, spec: &CommandSpec) -> io::Result<ProcessOutput> {
    self.calls.lock().unwrap().push(spec.clone());

    if let Some(prefix) = spec.args.iter().find_map(|a| a.strip_prefix("-DCMAKE_INSTALL_PREFIX=")) {
      *self.install_prefix.lock().unwrap() = Some(PathBuf::from(prefix));
    }

    if self.fail_phase.is_some_and(|needle| spec.args.iter().any(|a| a == needle)) {
      return Ok(ProcessOutput {
        code: Some(2),
        stdout: String::new(),
        stderr: "ninja: build stopped: subcommand failed.\n".to_string(),
      });
    }

    if spec.args.iter().any(|a| a == "--build") {
      self.install()?;
    }

    Ok(ProcessOutput {
      code: Some(0),
      stdout: "-- Build files have been written\n".to_string(),
      stderr: String::new(),
    })
  }
}

pub fn linux_gcc() -> PlatformContext {
  PlatformContext::new(
    Os::Linux,
    Arch::X86_64,
    Compiler::new(CompilerKind::Gcc, 9),
    BuildType::Release,
  )
}

pub fn pipeline(source: FakeSource, cmake: ScriptedCmake) -> Pipeline<FakeSource, ScriptedCmake> {
  let config = InvokerConfig {
    cmake: PathBuf::from("cmake"),
    jobs: None,
  };
  Pipeline::with_parts(source, BuildInvoker::with_runner(cmake, config))
}
