use std::time::Instant;

use anyhow::{Context, Result};

use buildstage_lib::pipeline::{Pipeline, PipelineRequest};
use buildstage_lib::util::hash::Hashable;

use crate::args::{BuildArgs, OptionArgs, PlatformArgs, RecipeArgs, WorkdirArgs};
use crate::output::{format_duration, print_info, print_json, print_stat, print_success, truncate_hash};

pub fn cmd_run(
  recipe: &RecipeArgs,
  platform: &PlatformArgs,
  options: &OptionArgs,
  workdir: &WorkdirArgs,
  build: &BuildArgs,
  json: bool,
) -> Result<()> {
  let start = Instant::now();

  let recipe = recipe.load()?;
  let platform = platform.resolve()?;
  let options = options.parse(&recipe)?;
  let work = workdir.workdir(&recipe);
  let outdir = workdir.outdir(&work);

  if !json {
    print_info(&format!("{} {} for {}", recipe.name, recipe.version, platform));
  }

  let pipeline = Pipeline::new(build.invoker_config());
  let request = PipelineRequest {
    recipe: &recipe,
    options: &options,
    platform: &platform,
    workdir: &work,
    outdir: &outdir,
  };

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt
    .block_on(pipeline.run(request))
    .with_context(|| format!("Failed to build {} {}", recipe.name, recipe.version))?;
  let fingerprint = report.mapping.fingerprint().context("Failed to fingerprint configuration")?;

  if json {
    let states: Vec<_> = report.build.states.iter().map(ToString::to_string).collect();
    let json_output = serde_json::json!({
      "recipe": recipe.name,
      "version": recipe.version,
      "platform": platform.to_string(),
      "fingerprint": fingerprint.0,
      "commit": report.source.commit,
      "states": states,
      "configure_reused": report.build.configure_reused,
      "requirements": report.mapping.requirements,
      "artifacts": report.artifacts,
    });
    return print_json(&json_output);
  }

  print_success(&format!(
    "Packaged {} {} in {}",
    recipe.name,
    recipe.version,
    format_duration(start.elapsed())
  ));
  print_stat("Commit", truncate_hash(&report.source.commit));
  print_stat("Fingerprint", truncate_hash(&fingerprint.0));
  print_stat("Package", &report.artifacts.outdir.display().to_string());
  print_stat("Libs", &report.artifacts.package.libs.join(" "));
  if !report.mapping.requirements.is_empty() {
    let requirements: Vec<_> = report.mapping.requirements.iter().map(ToString::to_string).collect();
    print_stat("Requires", &requirements.join(", "));
  }

  Ok(())
}
