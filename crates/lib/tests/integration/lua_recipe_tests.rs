use buildstage_lib::configure::{Generator, configure};
use buildstage_lib::options::OptionSet;
use buildstage_lib::pipeline::PipelineRequest;
use buildstage_lib::recipe::lua::load_recipe;
use buildstage_lib::workdir::Workdir;
use tempfile::TempDir;

use super::common::{FakeSource, ScriptedCmake, linux_gcc, pipeline};

const TORCHLITE: &str = r#"
local recipe = {
  name = "torchlite",
  version = "0.4.0",
  url = "https://example.com/torchlite.git",
  tag = "release-0.4.0",
  license = "BSD-3-Clause",
  options = {
    shared = { default = true, variable = "BUILD_SHARED_LIBS" },
    use_ninja_build = { default = false },
  },
  forced_variables = { TORCHLITE_EXAMPLES = "OFF" },
  generator_option = "use_ninja_build",
  staging = {
    rules = {
      { pattern = "LICENSE", from = "source", dst = "licenses", required = true },
      { pattern = "include/*", from = "install" },
      { pattern = "lib/*", from = "install", required = true },
    },
  },
}

if buildstage.os == "windows" then
  recipe.staging.system_libs = { { compiler = "visual-studio", libs = { "ws2_32" } } }
end

return recipe
"#;

fn write_recipe(temp: &TempDir) -> std::path::PathBuf {
  let path = temp.path().join("torchlite.lua");
  std::fs::write(&path, TORCHLITE).unwrap();
  path
}

#[test]
fn lua_recipe_configures_like_builtin() {
  let temp = TempDir::new().unwrap();
  let recipe = load_recipe(&write_recipe(&temp)).unwrap();

  let mapping = configure(&recipe, &OptionSet::new().with("shared", false), &linux_gcc()).unwrap();

  assert_eq!(recipe.tag(), "release-0.4.0");
  assert_eq!(mapping.generator, Generator::UnixMakefiles);
  assert_eq!(mapping.variable("BUILD_SHARED_LIBS"), Some("OFF"));
  assert_eq!(mapping.variable("TORCHLITE_EXAMPLES"), Some("OFF"));
  assert!(mapping.requirements.is_empty());
}

#[tokio::test]
async fn lua_recipe_runs_end_to_end() {
  let temp = TempDir::new().unwrap();
  let recipe = load_recipe(&write_recipe(&temp)).unwrap();
  let workdir = Workdir::new(temp.path().join("work"));
  let outdir = temp.path().join("out");
  let options = OptionSet::new();
  let platform = linux_gcc();

  let source = FakeSource::with_files(&[("LICENSE", "BSD-3-Clause\n"), ("CMakeLists.txt", "project(torchlite)\n")]);
  let pipeline = pipeline(source, ScriptedCmake::default());
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

  assert!(report.patches.is_empty());
  assert_eq!(report.artifacts.package.libs, vec!["c10", "torch"]);
  assert!(outdir.join("licenses/LICENSE").is_file());
  assert!(!outdir.join("bin").exists());

  let calls = pipeline.invoker().runner().calls();
  assert!(calls[0].args.iter().any(|a| a == "Unix Makefiles"));
}
