use anyhow::{Context, Result};
use serde::Serialize;

use buildstage_lib::configure::{ConfigurationMapping, configure};
use buildstage_lib::util::hash::Hashable;

use crate::args::{OptionArgs, PlatformArgs, RecipeArgs};
use crate::output::{print_json, print_stat, print_success, symbols, truncate_hash};

#[derive(Serialize)]
struct ConfigureReport<'a> {
  recipe: &'a str,
  version: &'a str,
  platform: String,
  fingerprint: String,
  #[serde(flatten)]
  mapping: &'a ConfigurationMapping,
}

pub fn cmd_configure(recipe: &RecipeArgs, platform: &PlatformArgs, options: &OptionArgs, json: bool) -> Result<()> {
  let recipe = recipe.load()?;
  let platform = platform.resolve()?;
  let options = options.parse(&recipe)?;

  let mapping = configure(&recipe, &options, &platform)
    .with_context(|| format!("Invalid configuration for {} {}", recipe.name, recipe.version))?;
  let fingerprint = mapping.fingerprint().context("Failed to fingerprint configuration")?;

  if json {
    return print_json(&ConfigureReport {
      recipe: &recipe.name,
      version: &recipe.version,
      platform: platform.to_string(),
      fingerprint: fingerprint.0,
      mapping: &mapping,
    });
  }

  print_success(&format!("{} {} for {}", recipe.name, recipe.version, platform));
  print_stat("Fingerprint", truncate_hash(&fingerprint.0));
  print_stat("Generator", mapping.generator.cmake_name());
  print_stat("Parallel", if mapping.parallel { "yes" } else { "no" });
  if mapping.activate_toolchain {
    print_stat("Toolchain", &format!("vcvarsall {}", mapping.arch.vcvars_arg()));
  }
  if !mapping.requirements.is_empty() {
    let requirements: Vec<_> = mapping.requirements.iter().map(ToString::to_string).collect();
    print_stat("Requires", &requirements.join(", "));
  }

  println!();
  println!("Variables:");
  for (name, value) in &mapping.variables {
    println!("  {} {}={}", symbols::ARROW, name, value);
  }
  if !mapping.environment.is_empty() {
    println!("Environment:");
    for (name, value) in &mapping.environment {
      println!("  {} {}={}", symbols::ARROW, name, value);
    }
  }

  Ok(())
}
