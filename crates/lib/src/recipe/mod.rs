//! Recipes: what to fetch, which options exist and how to stage the result.
//!
//! Recipes come from two places: the built-in table ([`builtin`]) and Lua
//! files evaluated by [`lua::load_recipe`]. Both produce the same
//! [`Recipe`] value, which is validated before use.

pub mod libtorch;
pub mod lua;
mod types;

pub use types::*;

use std::path::PathBuf;

use thiserror::Error;

use crate::configure::InvalidConfigurationError;

/// Names accepted by [`builtin`].
pub const BUILTIN_RECIPES: &[&str] = &["libtorch"];

/// Errors that can occur while loading a recipe.
#[derive(Debug, Error)]
pub enum RecipeError {
  #[error("unknown built-in recipe '{0}'")]
  UnknownBuiltin(String),

  #[error("failed to read recipe '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to evaluate recipe '{path}': {message}")]
  Lua { path: PathBuf, message: String },

  #[error("invalid recipe: {0}")]
  Invalid(#[from] InvalidConfigurationError),
}

/// Look up a built-in recipe by name.
pub fn builtin(name: &str) -> Result<Recipe, RecipeError> {
  match name {
    "libtorch" => Ok(libtorch::recipe()),
    _ => Err(RecipeError::UnknownBuiltin(name.to_string())),
  }
}

impl Recipe {
  /// The git tag for this recipe's version.
  pub fn tag(&self) -> String {
    self.tag.clone().unwrap_or_else(|| format!("v{}", self.version))
  }

  /// Check that every option the recipe refers to is declared with a
  /// default inside its domain.
  pub fn validate(&self) -> Result<(), InvalidConfigurationError> {
    for (name, decl) in self.options.iter() {
      decl.check(name, &decl.default)?;
    }

    for (context, name) in [
      ("generator selection", &self.generator_option),
      ("parallel build selection", &self.parallel_option),
    ] {
      let Some(name) = name else { continue };
      let decl = self
        .options
        .get(name)
        .ok_or_else(|| InvalidConfigurationError::UndeclaredOption {
          context: context.to_string(),
          name: name.clone(),
        })?;
      if !decl.is_bool() {
        return Err(InvalidConfigurationError::NotABoolean {
          context: context.to_string(),
          name: name.clone(),
        });
      }
    }

    for rule in &self.requirements {
      let context = format!(
        "requirement rule for [{}]",
        rule.requires.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
      );
      let decl = self
        .options
        .get(&rule.option)
        .ok_or_else(|| InvalidConfigurationError::UndeclaredOption {
          context,
          name: rule.option.clone(),
        })?;
      decl.check(&rule.option, &rule.when)?;
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::options::{OptionDecl, OptionSchema};

  fn minimal() -> Recipe {
    Recipe {
      name: "zlib".to_string(),
      version: "1.3".to_string(),
      url: "https://github.com/madler/zlib".to_string(),
      tag: None,
      description: None,
      license: None,
      options: OptionSchema::new()
        .declare("shared", OptionDecl::flag(true, "BUILD_SHARED_LIBS"))
        .declare("use_ninja_build", OptionDecl::switch(true)),
      requirements: Vec::new(),
      compilers: Vec::new(),
      forced_variables: Default::default(),
      configure_env: Default::default(),
      generator_option: Some("use_ninja_build".to_string()),
      parallel_option: None,
      patches: Vec::new(),
      staging: StagingSpec::default(),
    }
  }

  #[test]
  fn tag_defaults_to_v_prefixed_version() {
    let mut recipe = minimal();
    assert_eq!(recipe.tag(), "v1.3");

    recipe.tag = Some("release-1.3".to_string());
    assert_eq!(recipe.tag(), "release-1.3");
  }

  #[test]
  fn requirement_parse_and_display() {
    let req: Requirement = "protobuf/3.8.0@forwardmeasure/stable".parse().unwrap();
    assert_eq!(req.name, "protobuf");
    assert_eq!(req.version, "3.8.0");
    assert_eq!(req.channel.as_deref(), Some("forwardmeasure/stable"));
    assert_eq!(req.to_string(), "protobuf/3.8.0@forwardmeasure/stable");

    let bare: Requirement = "eigen/3.3.7".parse().unwrap();
    assert_eq!(bare.channel, None);

    assert!("protobuf".parse::<Requirement>().is_err());
    assert!("/3.8.0".parse::<Requirement>().is_err());
  }

  #[test]
  fn validate_accepts_consistent_recipe() {
    assert!(minimal().validate().is_ok());
  }

  #[test]
  fn validate_rejects_rule_on_undeclared_option() {
    let mut recipe = minimal();
    recipe.requirements.push(RequirementRule::when(
      "build_test",
      true,
      vec![Requirement::new("gtest", "1.8.1")],
    ));

    assert!(matches!(
      recipe.validate(),
      Err(InvalidConfigurationError::UndeclaredOption { name, .. }) if name == "build_test"
    ));
  }

  #[test]
  fn validate_rejects_non_boolean_generator_option() {
    let mut recipe = minimal();
    recipe.options = recipe
      .options
      .declare("generator", OptionDecl::choice(&["ninja", "make"], "ninja", "GEN"));
    recipe.generator_option = Some("generator".to_string());

    assert!(matches!(
      recipe.validate(),
      Err(InvalidConfigurationError::NotABoolean { .. })
    ));
  }

  #[test]
  fn validate_rejects_default_outside_domain() {
    let mut decl = OptionDecl::choice(&["a", "b"], "a", "X");
    decl.default = "c".into();
    let mut recipe = minimal();
    recipe.options = recipe.options.declare("pick", decl);

    assert!(matches!(
      recipe.validate(),
      Err(InvalidConfigurationError::InvalidValue { .. })
    ));
  }

  #[test]
  fn builtin_lookup() {
    assert_eq!(builtin("libtorch").unwrap().name, "libtorch");
    assert!(matches!(builtin("tensorflow"), Err(RecipeError::UnknownBuiltin(_))));
  }
}
