//! End-to-end orchestration.
//!
//! `validate -> fetch -> patch -> build -> stage`, strictly in that order,
//! once per invocation. The work directory is locked for the whole run.
//! Configuration is resolved before the lock is taken or any process runs,
//! so invalid input never costs a clone or a build.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::build::{BuildInvoker, BuildOutcome, BuildProcessError, InvokerConfig, ProcessRunner, SystemRunner};
use crate::configure::{ConfigurationMapping, InvalidConfigurationError, configure};
use crate::options::OptionSet;
use crate::platform::{PlatformContext, PlatformError};
use crate::recipe::{Recipe, RecipeError};
use crate::source::{self, FetchedSource, PatchStatus, SourceFetchError};
use crate::stage::{BuildArtifactSet, StagingError, stage};
use crate::workdir::{Workdir, WorkdirLockError};

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  Recipe(#[from] RecipeError),

  #[error(transparent)]
  Platform(#[from] PlatformError),

  #[error(transparent)]
  Configuration(#[from] InvalidConfigurationError),

  #[error(transparent)]
  Lock(#[from] WorkdirLockError),

  #[error(transparent)]
  Fetch(#[from] SourceFetchError),

  #[error(transparent)]
  Build(#[from] BuildProcessError),

  #[error(transparent)]
  Staging(#[from] StagingError),
}

/// Produces a checkout of one tag of a repository.
pub trait SourceAcquirer {
  fn acquire(&self, url: &str, tag: &str, dest: &Path) -> Result<FetchedSource, SourceFetchError>;
}

/// Git checkouts via [`source::fetch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GitSource;

impl SourceAcquirer for GitSource {
  fn acquire(&self, url: &str, tag: &str, dest: &Path) -> Result<FetchedSource, SourceFetchError> {
    source::fetch(url, tag, dest)
  }
}

/// Inputs of one pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineRequest<'a> {
  pub recipe: &'a Recipe,
  pub options: &'a OptionSet,
  pub platform: &'a PlatformContext,
  pub workdir: &'a Workdir,
  pub outdir: &'a Path,
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
  pub mapping: ConfigurationMapping,
  pub source: FetchedSource,
  pub patches: Vec<PatchStatus>,
  pub build: BuildOutcome,
  pub artifacts: BuildArtifactSet,
}

pub struct Pipeline<A = GitSource, R = SystemRunner> {
  acquirer: Arc<A>,
  invoker: BuildInvoker<R>,
}

impl Pipeline<GitSource, SystemRunner> {
  pub fn new(config: InvokerConfig) -> Self {
    Self::with_parts(GitSource, BuildInvoker::new(config))
  }
}

impl<A, R> Pipeline<A, R>
where
  A: SourceAcquirer + Send + Sync + 'static,
  R: ProcessRunner,
{
  pub fn with_parts(acquirer: A, invoker: BuildInvoker<R>) -> Self {
    Self {
      acquirer: Arc::new(acquirer),
      invoker,
    }
  }

  pub fn invoker(&self) -> &BuildInvoker<R> {
    &self.invoker
  }

  pub fn acquirer(&self) -> &A {
    &self.acquirer
  }

  /// Fetch the recipe's sources into the work directory and apply its
  /// patches. Runs on the blocking pool.
  pub async fn fetch(&self, recipe: &Recipe, workdir: &Workdir) -> Result<(FetchedSource, Vec<PatchStatus>), SourceFetchError> {
    let acquirer = Arc::clone(&self.acquirer);
    let url = recipe.url.clone();
    let tag = recipe.tag();
    let dest: PathBuf = workdir.source_dir();

    let fetched = tokio::task::spawn_blocking(move || acquirer.acquire(&url, &tag, &dest))
      .await
      .map_err(|e| SourceFetchError::Interrupted(e.to_string()))??;

    let patches = source::apply_patches(&fetched.path, &recipe.patches)?;
    Ok((fetched, patches))
  }

  /// Run every stage for `request`.
  pub async fn run(&self, request: PipelineRequest<'_>) -> Result<PipelineReport, PipelineError> {
    let PipelineRequest {
      recipe,
      options,
      platform,
      workdir,
      outdir,
    } = request;

    let mapping = configure(recipe, options, platform)?;

    let _lock = workdir.lock(&format!("pipeline {}-{}", recipe.name, recipe.version))?;
    info!(
      recipe = %recipe.name,
      version = %recipe.version,
      workdir = %workdir.root().display(),
      "starting pipeline"
    );

    let (source, patches) = self.fetch(recipe, workdir).await?;
    let build = self.invoker.build(&mapping, workdir).await?;
    let artifacts = stage(workdir, outdir, &recipe.staging, platform)?;

    info!(recipe = %recipe.name, outdir = %outdir.display(), "pipeline finished");
    Ok(PipelineReport {
      mapping,
      source,
      patches,
      build,
      artifacts,
    })
  }
}

/// Run the pipeline with git and real processes.
pub async fn run_pipeline(request: PipelineRequest<'_>, config: InvokerConfig) -> Result<PipelineReport, PipelineError> {
  Pipeline::new(config).run(request).await
}
