use anyhow::{Context, Result};

use buildstage_lib::stage::{ArtifactKind, stage};

use crate::args::{PlatformArgs, RecipeArgs, WorkdirArgs};
use crate::output::{print_json, print_stat, print_success};

pub fn cmd_stage(recipe: &RecipeArgs, platform: &PlatformArgs, workdir: &WorkdirArgs, json: bool) -> Result<()> {
  let recipe = recipe.load()?;
  let platform = platform.resolve()?;
  let work = workdir.workdir(&recipe);
  let outdir = workdir.outdir(&work);

  let _lock = work.lock(&format!("stage {}-{}", recipe.name, recipe.version))?;
  let artifacts = stage(&work, &outdir, &recipe.staging, &platform)
    .with_context(|| format!("Failed to stage {} into {}", recipe.name, outdir.display()))?;

  if json {
    return print_json(&artifacts);
  }

  print_success(&format!("Staged {} into {}", recipe.name, outdir.display()));
  print_stat("Headers", &artifacts.files_of(ArtifactKind::Header).count().to_string());
  print_stat("Libraries", &artifacts.files_of(ArtifactKind::Library).count().to_string());
  print_stat("Binaries", &artifacts.files_of(ArtifactKind::Binary).count().to_string());
  print_stat("Libs", &artifacts.package.libs.join(" "));
  if !artifacts.package.system_libs.is_empty() {
    print_stat("System libs", &artifacts.package.system_libs.join(" "));
  }

  Ok(())
}
