//! Argument groups shared between subcommands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use tracing::debug;

use buildstage_lib::build::InvokerConfig;
use buildstage_lib::options::OptionSet;
use buildstage_lib::platform::paths::default_workdir;
use buildstage_lib::platform::{Arch, BuildType, Compiler, CompilerKind, Os, PlatformContext};
use buildstage_lib::recipe::{self, Recipe};
use buildstage_lib::workdir::Workdir;

#[derive(Debug, Clone, Args)]
pub struct RecipeArgs {
  /// Built-in recipe name or path to a Lua recipe file
  #[arg(short, long, default_value = "libtorch")]
  pub recipe: String,
}

impl RecipeArgs {
  pub fn load(&self) -> Result<Recipe> {
    let path = Path::new(&self.recipe);
    if self.recipe.ends_with(".lua") || path.is_file() {
      recipe::lua::load_recipe(path).with_context(|| format!("Failed to load recipe: {}", self.recipe))
    } else {
      recipe::builtin(&self.recipe).with_context(|| {
        format!(
          "Failed to load recipe (built-in recipes: {})",
          recipe::BUILTIN_RECIPES.join(", ")
        )
      })
    }
  }
}

#[derive(Debug, Clone, Args)]
pub struct PlatformArgs {
  /// Target operating system (linux, darwin, windows); detected when omitted
  #[arg(long)]
  pub os: Option<Os>,

  /// Target architecture (x86_64, aarch64); detected when omitted
  #[arg(long)]
  pub arch: Option<Arch>,

  /// Compiler family (gcc, clang, apple-clang, visual-studio); detected when omitted
  #[arg(long)]
  pub compiler: Option<CompilerKind>,

  /// Compiler major version; detected when omitted
  #[arg(long)]
  pub compiler_version: Option<u32>,

  /// CMake build type
  #[arg(long, default_value = "Release")]
  pub build_type: BuildType,
}

impl PlatformArgs {
  /// Apply overrides, detecting whatever was not given.
  pub fn resolve(&self) -> Result<PlatformContext> {
    let os = match self.os {
      Some(os) => os,
      None => Os::current().context("Could not detect the operating system; pass --os")?,
    };
    let arch = match self.arch {
      Some(arch) => arch,
      None => Arch::current().context("Could not detect the architecture; pass --arch")?,
    };

    let compiler = match (self.compiler, self.compiler_version) {
      (Some(kind), Some(version)) => Compiler::new(kind, version),
      (None, Some(version)) => Compiler::new(CompilerKind::default_for(os), version),
      (kind, None) => {
        let detected = Compiler::detect(os).context("Failed to detect compiler; pass --compiler-version")?;
        debug!(compiler = %detected, "detected compiler");
        match kind {
          Some(kind) if kind != detected.kind => bail!(
            "Detected {} but --compiler {} was requested; pass --compiler-version too",
            detected,
            kind
          ),
          _ => detected,
        }
      }
    };

    Ok(PlatformContext::new(os, arch, compiler, self.build_type))
  }
}

#[derive(Debug, Clone, Args)]
pub struct OptionArgs {
  /// Set a recipe option (repeatable), e.g. -o shared=false
  #[arg(short = 'o', long = "option", value_name = "NAME=VALUE")]
  pub options: Vec<String>,
}

impl OptionArgs {
  pub fn parse(&self, recipe: &Recipe) -> Result<OptionSet> {
    OptionSet::from_assignments(&self.options, &recipe.options).context("Invalid option")
  }
}

#[derive(Debug, Clone, Args)]
pub struct WorkdirArgs {
  /// Work directory (default: <cache>/work/<name>-<version>)
  #[arg(long)]
  pub workdir: Option<PathBuf>,

  /// Package output directory (default: <workdir>/package)
  #[arg(long)]
  pub out: Option<PathBuf>,
}

impl WorkdirArgs {
  pub fn workdir(&self, recipe: &Recipe) -> Workdir {
    let root = self
      .workdir
      .clone()
      .unwrap_or_else(|| default_workdir(&recipe.name, &recipe.version));
    Workdir::new(root)
  }

  pub fn outdir(&self, workdir: &Workdir) -> PathBuf {
    self.out.clone().unwrap_or_else(|| workdir.root().join("package"))
  }
}

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
  /// Parallel build jobs (default: decided by the build tool)
  #[arg(short, long)]
  pub jobs: Option<usize>,

  /// cmake executable (default: $BUILDSTAGE_CMAKE or cmake)
  #[arg(long)]
  pub cmake: Option<PathBuf>,
}

impl BuildArgs {
  pub fn invoker_config(&self) -> InvokerConfig {
    let mut config = InvokerConfig::from_env();
    if let Some(cmake) = &self.cmake {
      config.cmake = cmake.clone();
    }
    config.jobs = self.jobs;
    config
  }
}
