use std::fs;

use anyhow::{Context, Result};
use tracing::debug;

use crate::args::{RecipeArgs, WorkdirArgs};
use crate::output::{print_info, print_success};

/// Remove the work directory of a recipe.
///
/// The lock is taken first so a running build is never pulled out from
/// under its processes. Everything but the lock file goes while it is held.
pub fn cmd_clean(recipe: &RecipeArgs, workdir: &WorkdirArgs) -> Result<()> {
  let recipe = recipe.load()?;
  let work = workdir.workdir(&recipe);
  let root = work.root().to_path_buf();

  if !root.exists() {
    print_info(&format!("Nothing to clean at {}", root.display()));
    return Ok(());
  }

  let lock = work.lock(&format!("clean {}-{}", recipe.name, recipe.version))?;
  let lock_path = work.lock_path();

  for entry in fs::read_dir(&root).with_context(|| format!("Failed to read {}", root.display()))? {
    let path = entry.with_context(|| format!("Failed to read {}", root.display()))?.path();
    if path == lock_path {
      continue;
    }
    debug!(path = %path.display(), "removing");
    let removed = if path.is_dir() && !path.is_symlink() {
      fs::remove_dir_all(&path)
    } else {
      fs::remove_file(&path)
    };
    removed.with_context(|| format!("Failed to remove {}", path.display()))?;
  }

  drop(lock);
  fs::remove_dir_all(&root).with_context(|| format!("Failed to remove {}", root.display()))?;

  print_success(&format!("Removed {}", root.display()));
  Ok(())
}
