use anyhow::{Context, Result};

use buildstage_lib::build::InvokerConfig;
use buildstage_lib::pipeline::Pipeline;
use buildstage_lib::source::PatchStatus;

use crate::args::{RecipeArgs, WorkdirArgs};
use crate::output::{print_info, print_stat, print_success, truncate_hash};

pub fn cmd_fetch(recipe: &RecipeArgs, workdir: &WorkdirArgs) -> Result<()> {
  let recipe = recipe.load()?;
  let workdir = workdir.workdir(&recipe);

  let _lock = workdir.lock(&format!("fetch {}-{}", recipe.name, recipe.version))?;
  print_info(&format!("Fetching {} {}", recipe.url, recipe.tag()));

  let pipeline = Pipeline::new(InvokerConfig::default());
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let (source, patches) = rt
    .block_on(pipeline.fetch(&recipe, &workdir))
    .with_context(|| format!("Failed to fetch {} {}", recipe.name, recipe.version))?;

  if source.reused {
    print_success(&format!("Source already at {}", recipe.tag()));
  } else {
    print_success(&format!("Fetched {} {}", recipe.name, recipe.tag()));
  }
  print_stat("Path", &source.path.display().to_string());
  print_stat("Commit", truncate_hash(&source.commit));

  let applied = patches.iter().filter(|p| **p == PatchStatus::Applied).count();
  if !patches.is_empty() {
    print_stat(
      "Patches",
      &format!("{} applied, {} already present", applied, patches.len() - applied),
    );
  }

  Ok(())
}
