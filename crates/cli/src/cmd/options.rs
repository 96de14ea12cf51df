use anyhow::Result;
use owo_colors::{OwoColorize, Stream};

use crate::args::RecipeArgs;
use crate::output::{print_info, print_json};

pub fn cmd_options(recipe: &RecipeArgs, json: bool) -> Result<()> {
  let recipe = recipe.load()?;

  if json {
    return print_json(&recipe.options);
  }

  print_info(&format!("{} {} declares {} options", recipe.name, recipe.version, recipe.options.len()));
  for (name, decl) in recipe.options.iter() {
    println!(
      "  {} = {}  {}",
      name.if_supports_color(Stream::Stdout, |s| s.bold()),
      decl.default,
      format!("[{}]", decl.kind.describe()).if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
    if let Some(variable) = &decl.variable {
      println!("      -> {}", variable);
    }
    if !decl.unsupported_on.is_empty() {
      let oses: Vec<_> = decl.unsupported_on.iter().map(|os| os.as_str()).collect();
      println!("      not on {}", oses.join(", "));
    }
    if let Some(description) = &decl.description {
      println!("      {}", description);
    }
  }

  Ok(())
}
