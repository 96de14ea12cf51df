mod args;
mod cmd;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use args::{BuildArgs, OptionArgs, PlatformArgs, RecipeArgs, WorkdirArgs};
use cmd::{cmd_build, cmd_clean, cmd_configure, cmd_fetch, cmd_info, cmd_options, cmd_run, cmd_stage};
use output::print_error;

/// Fetch, configure, build and package native libraries with CMake
#[derive(Parser)]
#[command(name = "bstage")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Show the recipe, the detected platform and directory defaults
  Info {
    #[command(flatten)]
    recipe: RecipeArgs,
  },

  /// List the options a recipe declares
  Options {
    #[command(flatten)]
    recipe: RecipeArgs,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Check out the recipe's sources and apply its patches
  Fetch {
    #[command(flatten)]
    recipe: RecipeArgs,

    #[command(flatten)]
    workdir: WorkdirArgs,
  },

  /// Resolve options into build variables without running anything
  Configure {
    #[command(flatten)]
    recipe: RecipeArgs,

    #[command(flatten)]
    platform: PlatformArgs,

    #[command(flatten)]
    options: OptionArgs,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Configure and compile previously fetched sources
  Build {
    #[command(flatten)]
    recipe: RecipeArgs,

    #[command(flatten)]
    platform: PlatformArgs,

    #[command(flatten)]
    options: OptionArgs,

    #[command(flatten)]
    workdir: WorkdirArgs,

    #[command(flatten)]
    build: BuildArgs,
  },

  /// Copy build outputs into a package directory
  Stage {
    #[command(flatten)]
    recipe: RecipeArgs,

    #[command(flatten)]
    platform: PlatformArgs,

    #[command(flatten)]
    workdir: WorkdirArgs,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Fetch, configure, build and stage in one go
  Run {
    #[command(flatten)]
    recipe: RecipeArgs,

    #[command(flatten)]
    platform: PlatformArgs,

    #[command(flatten)]
    options: OptionArgs,

    #[command(flatten)]
    workdir: WorkdirArgs,

    #[command(flatten)]
    build: BuildArgs,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Remove a work directory
  Clean {
    #[command(flatten)]
    recipe: RecipeArgs,

    #[command(flatten)]
    workdir: WorkdirArgs,
  },
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Info { recipe } => cmd_info(&recipe),
    Commands::Options { recipe, json } => cmd_options(&recipe, json),
    Commands::Fetch { recipe, workdir } => cmd_fetch(&recipe, &workdir),
    Commands::Configure {
      recipe,
      platform,
      options,
      json,
    } => cmd_configure(&recipe, &platform, &options, json),
    Commands::Build {
      recipe,
      platform,
      options,
      workdir,
      build,
    } => cmd_build(&recipe, &platform, &options, &workdir, &build),
    Commands::Stage {
      recipe,
      platform,
      workdir,
      json,
    } => cmd_stage(&recipe, &platform, &workdir, json),
    Commands::Run {
      recipe,
      platform,
      options,
      workdir,
      build,
      json,
    } => cmd_run(&recipe, &platform, &options, &workdir, &build, json),
    Commands::Clean { recipe, workdir } => cmd_clean(&recipe, &workdir),
  };

  if let Err(err) = result {
    print_error(&format!("{:#}", err));
    std::process::exit(1);
  }
}
