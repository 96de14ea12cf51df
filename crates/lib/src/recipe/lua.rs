//! Lua recipe files.
//!
//! A recipe file is a Lua chunk returning a table with the same shape as
//! [`Recipe`]:
//!
//! ```lua
//! return {
//!   name = "zlib",
//!   version = "1.3.1",
//!   url = "https://github.com/madler/zlib.git",
//!   options = {
//!     shared = { default = true, variable = "BUILD_SHARED_LIBS" },
//!     fPIC = { default = true, variable = "CMAKE_POSITION_INDEPENDENT_CODE", unsupported_on = { "windows" } },
//!   },
//!   staging = {
//!     rules = { { pattern = "LICENSE", from = "source", dst = "licenses", required = true } },
//!   },
//! }
//! ```
//!
//! The chunk can branch on the `buildstage` global (`buildstage.os`,
//! `buildstage.arch`, `buildstage.platform`).

use std::path::Path;

use mlua::prelude::*;
use tracing::{debug, info};

use crate::platform::{Arch, Os};
use crate::recipe::{Recipe, RecipeError};

/// Load, evaluate and validate a Lua recipe file.
pub fn load_recipe(path: &Path) -> Result<Recipe, RecipeError> {
  let content = std::fs::read_to_string(path).map_err(|source| RecipeError::Read {
    path: path.to_path_buf(),
    source,
  })?;

  let chunk_name = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
  let recipe = eval_recipe(&content, &chunk_name.display().to_string()).map_err(|e| RecipeError::Lua {
    path: path.to_path_buf(),
    message: e.to_string(),
  })?;

  recipe.validate()?;

  info!(name = %recipe.name, version = %recipe.version, path = %path.display(), "loaded recipe");
  Ok(recipe)
}

/// Evaluate recipe source and deserialize the returned table.
pub fn eval_recipe(source: &str, chunk_name: &str) -> LuaResult<Recipe> {
  let lua = Lua::new();
  register_globals(&lua)?;

  let value = lua.load(source).set_name(format!("@{}", chunk_name)).eval::<LuaValue>()?;
  if !matches!(value, LuaValue::Table(_)) {
    return Err(LuaError::external("recipe must return a table"));
  }

  debug!(chunk = chunk_name, "deserializing recipe table");
  lua.from_value(value)
}

/// Register the `buildstage` global table.
fn register_globals(lua: &Lua) -> LuaResult<()> {
  let globals = lua.create_table()?;

  if let Some(os) = Os::current() {
    globals.set("os", os.as_str())?;
  }
  if let Some(arch) = Arch::current() {
    globals.set("arch", arch.as_str())?;
  }
  if let (Some(os), Some(arch)) = (Os::current(), Arch::current()) {
    globals.set("platform", format!("{}-{}", arch, os))?;
  }
  globals.set("version", env!("CARGO_PKG_VERSION"))?;

  lua.globals().set("buildstage", globals)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::options::{OptionKind, OptionValue};
  use crate::recipe::{Requirement, StageRoot};
  use tempfile::TempDir;

  const ZLIB: &str = r#"
    return {
      name = "zlib",
      version = "1.3.1",
      url = "https://github.com/madler/zlib.git",
      options = {
        shared = { default = true, variable = "BUILD_SHARED_LIBS" },
        fPIC = { default = true, variable = "CMAKE_POSITION_INDEPENDENT_CODE", unsupported_on = { "windows" } },
        prefix = { kind = "text", default = "z_", variable = "Z_PREFIX" },
        flavor = { kind = { choice = { "fast", "small" } }, default = "fast", variable = "ZLIB_FLAVOR" },
        use_ninja_build = { default = false },
      },
      requirements = {
        { option = "shared", requires = { "cmake/3.28.1" } },
      },
      generator_option = "use_ninja_build",
      staging = {
        rules = { { pattern = "LICENSE", from = "source", dst = "licenses", required = true } },
      },
    }
  "#;

  #[test]
  fn evaluates_recipe_table() {
    let recipe = eval_recipe(ZLIB, "zlib.lua").unwrap();

    assert_eq!(recipe.name, "zlib");
    assert_eq!(recipe.tag(), "v1.3.1");
    assert_eq!(recipe.options.len(), 5);

    let fpic = recipe.options.get("fPIC").unwrap();
    assert_eq!(fpic.unsupported_on, vec![Os::Windows]);

    let prefix = recipe.options.get("prefix").unwrap();
    assert_eq!(prefix.kind, OptionKind::Text);
    assert_eq!(prefix.default, OptionValue::from("z_"));

    let flavor = recipe.options.get("flavor").unwrap();
    assert_eq!(flavor.kind, OptionKind::Choice(vec!["fast".to_string(), "small".to_string()]));

    assert_eq!(recipe.requirements[0].when, OptionValue::Bool(true));
    assert_eq!(recipe.requirements[0].requires, vec![Requirement::new("cmake", "3.28.1")]);

    let rule = &recipe.staging.rules[0];
    assert_eq!(rule.from, StageRoot::Source);
    assert!(rule.required);
    assert!(rule.keep_path);
    assert_eq!(recipe.staging.lib_dir, "lib");
  }

  #[test]
  fn recipe_sees_buildstage_globals() {
    let source = r#"
      return {
        name = "sample",
        version = buildstage.version,
        url = "https://example.com/sample.git",
        description = buildstage.os .. "/" .. buildstage.arch,
        options = {},
      }
    "#;

    let recipe = eval_recipe(source, "sample.lua").unwrap();
    assert_eq!(recipe.version, env!("CARGO_PKG_VERSION"));
    let description = recipe.description.unwrap();
    assert!(description.contains('/'));
  }

  #[test]
  fn non_table_result_fails() {
    assert!(eval_recipe("return 42", "bad.lua").is_err());
  }

  #[test]
  fn missing_fields_fail() {
    assert!(eval_recipe("return { name = 'x' }", "bad.lua").is_err());
  }

  #[test]
  fn load_recipe_validates() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("recipe.lua");
    std::fs::write(
      &path,
      r#"
        return {
          name = "broken",
          version = "1.0",
          url = "https://example.com/broken.git",
          options = {},
          parallel_option = "enable_parallel_build",
        }
      "#,
    )
    .unwrap();

    assert!(matches!(load_recipe(&path), Err(RecipeError::Invalid(_))));
  }

  #[test]
  fn load_recipe_reports_missing_file() {
    let temp = TempDir::new().unwrap();
    let result = load_recipe(&temp.path().join("nope.lua"));
    assert!(matches!(result, Err(RecipeError::Read { .. })));
  }

  #[test]
  fn load_recipe_reports_lua_errors() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("recipe.lua");
    std::fs::write(&path, "this is not lua {{{").unwrap();

    assert!(matches!(load_recipe(&path), Err(RecipeError::Lua { .. })));
  }
}
