use anyhow::{Context, Result};

use buildstage_lib::build::BuildInvoker;
use buildstage_lib::configure::configure;

use crate::args::{BuildArgs, OptionArgs, PlatformArgs, RecipeArgs, WorkdirArgs};
use crate::output::{print_info, print_stat, print_success};

pub fn cmd_build(
  recipe: &RecipeArgs,
  platform: &PlatformArgs,
  options: &OptionArgs,
  workdir: &WorkdirArgs,
  build: &BuildArgs,
) -> Result<()> {
  let recipe = recipe.load()?;
  let platform = platform.resolve()?;
  let options = options.parse(&recipe)?;
  let workdir = workdir.workdir(&recipe);

  let mapping = configure(&recipe, &options, &platform)
    .with_context(|| format!("Invalid configuration for {} {}", recipe.name, recipe.version))?;

  let _lock = workdir.lock(&format!("build {}-{}", recipe.name, recipe.version))?;
  print_info(&format!("Building {} {} for {}", recipe.name, recipe.version, platform));

  let invoker = BuildInvoker::new(build.invoker_config());
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt
    .block_on(invoker.build(&mapping, &workdir))
    .with_context(|| format!("Build of {} {} failed", recipe.name, recipe.version))?;

  print_success(&format!("Built {} {}", recipe.name, recipe.version));
  print_stat("Build dir", &workdir.build_dir().display().to_string());
  print_stat(
    "Configure",
    if outcome.configure_reused { "reused" } else { "ran" },
  );
  if !outcome.requirements.is_empty() {
    let requirements: Vec<_> = outcome.requirements.iter().map(ToString::to_string).collect();
    print_stat("Requires", &requirements.join(", "));
  }

  Ok(())
}
