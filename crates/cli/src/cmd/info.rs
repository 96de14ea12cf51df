use anyhow::Result;

use buildstage_lib::platform::PlatformContext;
use buildstage_lib::platform::paths::{cache_dir, default_workdir};

use crate::args::RecipeArgs;
use crate::output::{print_info, print_stat, print_warning};

pub fn cmd_info(recipe: &RecipeArgs) -> Result<()> {
  let recipe = recipe.load()?;

  print_info(&format!("bstage {}", env!("CARGO_PKG_VERSION")));
  match PlatformContext::detect(Default::default()) {
    Ok(platform) => {
      print_stat("Platform", &platform.triple());
      print_stat("Compiler", &platform.compiler.to_string());
    }
    Err(e) => print_warning(&format!("Could not detect platform: {}", e)),
  }
  print_stat("Cache", &cache_dir().display().to_string());

  println!();
  print_info(&format!("Recipe {} {}", recipe.name, recipe.version));
  if let Some(description) = &recipe.description {
    print_stat("Description", description);
  }
  print_stat("Source", &format!("{} @ {}", recipe.url, recipe.tag()));
  if let Some(license) = &recipe.license {
    print_stat("License", license);
  }
  print_stat("Options", &recipe.options.len().to_string());
  print_stat(
    "Workdir",
    &default_workdir(&recipe.name, &recipe.version).display().to_string(),
  );

  Ok(())
}
