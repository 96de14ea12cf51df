use buildstage_lib::build::{BuildProcessError, BuildState, Phase};
use buildstage_lib::configure::InvalidConfigurationError;
use buildstage_lib::options::OptionSet;
use buildstage_lib::pipeline::{PipelineError, PipelineRequest};
use buildstage_lib::platform::{Arch, BuildType, Compiler, CompilerKind, Os, PlatformContext};
use buildstage_lib::recipe::libtorch;
use buildstage_lib::source::PatchStatus;
use buildstage_lib::stage::{ArtifactKind, StagingError};
use buildstage_lib::workdir::{Workdir, WorkdirLockError};
use tempfile::TempDir;

use super::common::{COMMIT, FakeSource, ScriptedCmake, linux_gcc, pipeline};

#[tokio::test]
async fn linux_defaults_build_and_stage() {
  let temp = TempDir::new().unwrap();
  let workdir = Workdir::new(temp.path().join("work"));
  let outdir = temp.path().join("package");
  let recipe = libtorch::recipe();
  let options = OptionSet::new();
  let platform = linux_gcc();

  let pipeline = pipeline(FakeSource::libtorch(), ScriptedCmake::default());
  let report = pipeline
    .run(PipelineRequest {
      recipe: &recipe,
      options: &options,
      platform: &platform,
      workdir: &workdir,
      outdir: &outdir,
    })
    .await
    .unwrap();

  assert_eq!(report.source.commit, COMMIT);
  assert_eq!(report.patches, vec![PatchStatus::Applied]);
  assert_eq!(
    report.build.states,
    vec![
      BuildState::NotStarted,
      BuildState::Configuring,
      BuildState::Compiling,
      BuildState::Succeeded
    ]
  );
  assert_eq!(report.mapping.variable("BUILD_SHARED_LIBS"), Some("ON"));
  assert_eq!(report.mapping.variable("CMAKE_POSITION_INDEPENDENT_CODE"), Some("ON"));

  assert_eq!(report.artifacts.package.libs, vec!["c10", "torch"]);
  assert!(report.artifacts.package.system_libs.is_empty());
  assert!(outdir.join("licenses/LICENSE").is_file());
  assert!(outdir.join("include/torch/torch.h").is_file());
  assert!(outdir.join("lib/libtorch.so").is_file());
  assert_eq!(report.artifacts.files_of(ArtifactKind::Binary).count(), 1);

  let patched = std::fs::read_to_string(workdir.source_dir().join("caffe2/CMakeLists.txt")).unwrap();
  assert!(patched.contains("/../../aten/src/ATen"));
}

#[tokio::test]
async fn configure_runs_before_compile() {
  let temp = TempDir::new().unwrap();
  let workdir = Workdir::new(temp.path().join("work"));
  let outdir = temp.path().join("package");
  let recipe = libtorch::recipe();
  let options = OptionSet::new();
  let platform = linux_gcc();

  let pipeline = pipeline(FakeSource::libtorch(), ScriptedCmake::default());
  pipeline
    .run(PipelineRequest {
      recipe: &recipe,
      options: &options,
      platform: &platform,
      workdir: &workdir,
      outdir: &outdir,
    })
    .await
    .unwrap();

  let calls = pipeline.invoker().runner().calls();
  assert_eq!(calls.len(), 2);
  assert!(calls[0].args.iter().any(|a| a == "-S"));
  assert!(calls[0].args.iter().any(|a| a == "-DUSE_CUDA=OFF"));
  assert!(calls[1].args.iter().any(|a| a == "--build"));
  assert!(calls[1].args.iter().any(|a| a == "install"));
}

#[tokio::test]
async fn second_run_reuses_checkout_and_configuration() {
  let temp = TempDir::new().unwrap();
  let workdir = Workdir::new(temp.path().join("work"));
  let outdir = temp.path().join("package");
  let recipe = libtorch::recipe();
  let options = OptionSet::new();
  let platform = linux_gcc();
  let request = PipelineRequest {
    recipe: &recipe,
    options: &options,
    platform: &platform,
    workdir: &workdir,
    outdir: &outdir,
  };

  let pipeline = pipeline(FakeSource::libtorch(), ScriptedCmake::default());
  pipeline.run(request).await.unwrap();
  let second = pipeline.run(request).await.unwrap();

  assert!(second.source.reused);
  assert_eq!(second.patches, vec![PatchStatus::AlreadyApplied]);
  assert!(second.build.configure_reused);
  assert_eq!(pipeline.invoker().runner().configure_calls(), 1);
  assert_eq!(pipeline.acquirer().calls(), 2);
}

#[tokio::test]
async fn changed_options_reconfigure() {
  let temp = TempDir::new().unwrap();
  let workdir = Workdir::new(temp.path().join("work"));
  let outdir = temp.path().join("package");
  let recipe = libtorch::recipe();
  let platform = linux_gcc();
  let defaults = OptionSet::new();
  let static_libs = OptionSet::new().with("shared", false);

  let pipeline = pipeline(FakeSource::libtorch(), ScriptedCmake::default());
  for options in [&defaults, &static_libs] {
    pipeline
      .run(PipelineRequest {
        recipe: &recipe,
        options,
        platform: &platform,
        workdir: &workdir,
        outdir: &outdir,
      })
      .await
      .unwrap();
  }

  assert_eq!(pipeline.invoker().runner().configure_calls(), 2);
}

#[tokio::test]
async fn invalid_options_never_touch_the_workdir() {
  let temp = TempDir::new().unwrap();
  let workdir = Workdir::new(temp.path().join("work"));
  let outdir = temp.path().join("package");
  let recipe = libtorch::recipe();
  let options = OptionSet::new().with("use_quantum", true);
  let platform = linux_gcc();

  let pipeline = pipeline(FakeSource::libtorch(), ScriptedCmake::default());
  let err = pipeline
    .run(PipelineRequest {
      recipe: &recipe,
      options: &options,
      platform: &platform,
      workdir: &workdir,
      outdir: &outdir,
    })
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    PipelineError::Configuration(InvalidConfigurationError::UnknownOption { .. })
  ));
  assert_eq!(pipeline.acquirer().calls(), 0);
  assert!(pipeline.invoker().runner().calls().is_empty());
  assert!(!workdir.root().exists());
}

#[tokio::test]
async fn old_visual_studio_is_rejected_before_fetch() {
  let temp = TempDir::new().unwrap();
  let workdir = Workdir::new(temp.path().join("work"));
  let outdir = temp.path().join("package");
  let recipe = libtorch::recipe();
  let options = OptionSet::new();
  let platform = PlatformContext::new(
    Os::Windows,
    Arch::X86_64,
    Compiler::new(CompilerKind::VisualStudio, 12),
    BuildType::Release,
  );

  let pipeline = pipeline(FakeSource::libtorch(), ScriptedCmake::default());
  let err = pipeline
    .run(PipelineRequest {
      recipe: &recipe,
      options: &options,
      platform: &platform,
      workdir: &workdir,
      outdir: &outdir,
    })
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    PipelineError::Configuration(InvalidConfigurationError::UnsupportedCompiler { minimum: 14, .. })
  ));
  assert_eq!(pipeline.acquirer().calls(), 0);
}

#[tokio::test]
async fn locked_workdir_is_reported() {
  let temp = TempDir::new().unwrap();
  let workdir = Workdir::new(temp.path().join("work"));
  let outdir = temp.path().join("package");
  let recipe = libtorch::recipe();
  let options = OptionSet::new();
  let platform = linux_gcc();

  let _held = workdir.lock("bstage run").unwrap();

  let pipeline = pipeline(FakeSource::libtorch(), ScriptedCmake::default());
  let err = pipeline
    .run(PipelineRequest {
      recipe: &recipe,
      options: &options,
      platform: &platform,
      workdir: &workdir,
      outdir: &outdir,
    })
    .await
    .unwrap_err();

  match err {
    PipelineError::Lock(WorkdirLockError::Contention { command, .. }) => assert_eq!(command, "bstage run"),
    other => panic!("expected lock contention, got {other:?}"),
  }
  assert_eq!(pipeline.acquirer().calls(), 0);
}

#[tokio::test]
async fn compile_failure_stops_before_staging() {
  let temp = TempDir::new().unwrap();
  let workdir = Workdir::new(temp.path().join("work"));
  let outdir = temp.path().join("package");
  let recipe = libtorch::recipe();
  let options = OptionSet::new();
  let platform = linux_gcc();

  let pipeline = pipeline(FakeSource::libtorch(), ScriptedCmake::failing("--build"));
  let err = pipeline
    .run(PipelineRequest {
      recipe: &recipe,
      options: &options,
      platform: &platform,
      workdir: &workdir,
      outdir: &outdir,
    })
    .await
    .unwrap_err();

  match err {
    PipelineError::Build(BuildProcessError::Failed { phase, code, stderr, .. }) => {
      assert_eq!(phase, Phase::Compile);
      assert_eq!(code, Some(2));
      assert!(stderr.contains("subcommand failed"));
    }
    other => panic!("expected compile failure, got {other:?}"),
  }
  assert!(!outdir.exists());
}

#[tokio::test]
async fn missing_license_fails_staging() {
  let temp = TempDir::new().unwrap();
  let workdir = Workdir::new(temp.path().join("work"));
  let outdir = temp.path().join("package");
  let recipe = libtorch::recipe();
  let options = OptionSet::new();
  let platform = linux_gcc();

  let source = FakeSource::with_files(&[(
    "caffe2/CMakeLists.txt",
    "COMMAND --yaml_dir=${CMAKE_CURRENT_BINARY_DIR}/../aten/src/ATen\n",
  )]);
  let pipeline = pipeline(source, ScriptedCmake::default());
  let err = pipeline
    .run(PipelineRequest {
      recipe: &recipe,
      options: &options,
      platform: &platform,
      workdir: &workdir,
      outdir: &outdir,
    })
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    PipelineError::Staging(StagingError::MissingRequired { ref pattern, .. }) if pattern == "LICENSE"
  ));
  assert!(!outdir.exists());
}

#[tokio::test]
async fn unpatchable_source_fails_fetch() {
  let temp = TempDir::new().unwrap();
  let workdir = Workdir::new(temp.path().join("work"));
  let outdir = temp.path().join("package");
  let recipe = libtorch::recipe();
  let options = OptionSet::new();
  let platform = linux_gcc();

  let source = FakeSource::with_files(&[("LICENSE", "BSD"), ("caffe2/CMakeLists.txt", "project(caffe2)\n")]);
  let pipeline = pipeline(source, ScriptedCmake::default());
  let err = pipeline
    .run(PipelineRequest {
      recipe: &recipe,
      options: &options,
      platform: &platform,
      workdir: &workdir,
      outdir: &outdir,
    })
    .await
    .unwrap_err();

  assert!(matches!(err, PipelineError::Fetch(_)));
  assert!(pipeline.invoker().runner().calls().is_empty());
}
