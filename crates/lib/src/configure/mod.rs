//! Option translation.
//!
//! [`configure`] turns a caller's [`OptionSet`] and the captured
//! [`PlatformContext`] into a [`ConfigurationMapping`]: the flat set of
//! CMake cache variables plus the few settings the invoker consumes
//! directly (generator, parallelism, environment, toolchain activation).
//!
//! Translation is a pure function. Every rejection happens here, before a
//! single process is spawned.

mod error;

pub use error::InvalidConfigurationError;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::build::requirements::resolve_requirements;
use crate::options::{self, OptionSet, OptionValue, ResolvedOptions};
use crate::platform::{Arch, BuildType, CompilerKind, Os, PlatformContext};
use crate::recipe::{Recipe, Requirement};
use crate::util::hash::{Fingerprint, HashError, Hashable};

/// Truthy token for boolean options.
pub const ON: &str = "ON";
/// Falsy token for boolean options.
pub const OFF: &str = "OFF";

/// CMake build-file generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Generator {
  #[serde(rename = "Ninja")]
  Ninja,
  #[serde(rename = "Unix Makefiles")]
  UnixMakefiles,
  #[serde(rename = "NMake Makefiles")]
  NMakeMakefiles,
}

impl Generator {
  /// Ninja when requested, otherwise the platform's Makefile flavour.
  pub fn select(use_ninja: bool, os: Os) -> Self {
    match (use_ninja, os) {
      (true, _) => Self::Ninja,
      (false, Os::Windows) => Self::NMakeMakefiles,
      (false, _) => Self::UnixMakefiles,
    }
  }

  /// Name passed to `cmake -G`.
  pub fn cmake_name(&self) -> &'static str {
    match self {
      Self::Ninja => "Ninja",
      Self::UnixMakefiles => "Unix Makefiles",
      Self::NMakeMakefiles => "NMake Makefiles",
    }
  }
}

impl fmt::Display for Generator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.cmake_name())
  }
}

/// Everything the build invoker needs, derived from options and platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationMapping {
  /// CMake cache variables, `-D<name>=<value>`.
  pub variables: BTreeMap<String, String>,
  pub generator: Generator,
  /// Whether the build tool may run its own parallel workers.
  pub parallel: bool,
  pub build_type: BuildType,
  /// Extra environment for the configure phase.
  pub environment: BTreeMap<String, String>,
  /// Dependencies the caller's package manager must provide.
  pub requirements: Vec<Requirement>,
  /// Whether the compile toolchain must be activated (MSVC).
  pub activate_toolchain: bool,
  /// Target architecture the toolchain is activated for.
  pub arch: Arch,
  /// The option values the mapping was derived from.
  pub options: ResolvedOptions,
}

impl Hashable for ConfigurationMapping {}

/// The fields of a mapping that reach `cmake` configure. Compile-only
/// settings such as `parallel` are left out so toggling them reuses the
/// existing build directory.
#[derive(Serialize)]
struct ConfigureKey<'a> {
  variables: &'a BTreeMap<String, String>,
  generator: Generator,
  build_type: BuildType,
  environment: &'a BTreeMap<String, String>,
  activate_toolchain: bool,
  arch: Arch,
}

impl Hashable for ConfigureKey<'_> {}

impl ConfigurationMapping {
  /// Fingerprint of what configure sees; decides whether a previous
  /// configuration can be reused.
  pub fn configure_fingerprint(&self) -> Result<Fingerprint, HashError> {
    ConfigureKey {
      variables: &self.variables,
      generator: self.generator,
      build_type: self.build_type,
      environment: &self.environment,
      activate_toolchain: self.activate_toolchain,
      arch: self.arch,
    }
    .fingerprint()
  }

  pub fn variable(&self, name: &str) -> Option<&str> {
    self.variables.get(name).map(String::as_str)
  }

  /// The variables as `-DNAME=VALUE` arguments, sorted by name.
  pub fn definitions(&self) -> Vec<String> {
    self.variables.iter().map(|(k, v)| format!("-D{}={}", k, v)).collect()
  }
}

/// Translate an option value to its CMake token.
pub fn cmake_value(value: &OptionValue) -> String {
  match value {
    OptionValue::Bool(true) => ON.to_string(),
    OptionValue::Bool(false) => OFF.to_string(),
    OptionValue::Text(text) => text.clone(),
  }
}

/// Build the configuration mapping for `recipe`.
///
/// Rejects, in order: an inconsistent recipe, a compiler that does not
/// exist on the target OS, a compiler below the recipe's minimum version,
/// and any option value the schema does not allow.
pub fn configure(
  recipe: &Recipe,
  options: &OptionSet,
  platform: &PlatformContext,
) -> Result<ConfigurationMapping, InvalidConfigurationError> {
  recipe.validate()?;
  check_compiler(recipe, platform)?;

  let resolved = options::resolve(&recipe.options, options, platform.os)?;

  let mut variables = BTreeMap::new();
  for (name, value) in resolved.iter() {
    let Some(variable) = recipe.options.get(name).and_then(|decl| decl.variable.as_ref()) else {
      continue;
    };
    variables.insert(variable.clone(), cmake_value(value));
  }
  variables.insert("CMAKE_BUILD_TYPE".to_string(), platform.build_type.as_str().to_string());

  // Fixed overrides win over anything derived from options.
  for (name, value) in &recipe.forced_variables {
    if let Some(previous) = variables.insert(name.clone(), value.clone()) {
      if previous != *value {
        debug!(variable = %name, from = %previous, to = %value, "forced variable overrides option");
      }
    }
  }

  let use_ninja = recipe
    .generator_option
    .as_deref()
    .and_then(|name| resolved.flag(name))
    .unwrap_or(false);
  let parallel = recipe
    .parallel_option
    .as_deref()
    .and_then(|name| resolved.flag(name))
    .unwrap_or(true);
  let generator = Generator::select(use_ninja, platform.os);

  let requirements = resolve_requirements(&recipe.requirements, &resolved);

  let mapping = ConfigurationMapping {
    variables,
    generator,
    parallel,
    build_type: platform.build_type,
    environment: recipe.configure_env.clone(),
    requirements,
    activate_toolchain: platform.os == Os::Windows && platform.compiler.kind == CompilerKind::VisualStudio,
    arch: platform.arch,
    options: resolved,
  };

  info!(
    recipe = %recipe.name,
    platform = %platform,
    variables = mapping.variables.len(),
    generator = %mapping.generator,
    "configuration resolved"
  );
  Ok(mapping)
}

fn check_compiler(recipe: &Recipe, platform: &PlatformContext) -> Result<(), InvalidConfigurationError> {
  let compiler = platform.compiler;

  if compiler.kind == CompilerKind::VisualStudio && platform.os != Os::Windows {
    return Err(InvalidConfigurationError::CompilerNotAvailable {
      compiler: compiler.kind,
      os: platform.os,
    });
  }

  for constraint in recipe.compilers.iter().filter(|c| c.compiler == compiler.kind) {
    if compiler.version < constraint.min_version {
      return Err(InvalidConfigurationError::UnsupportedCompiler {
        compiler: compiler.kind,
        version: compiler.version,
        minimum: constraint.min_version,
      });
    }
  }

  Ok(())
}
