//! Source acquisition.
//!
//! [`fetch`] produces a checkout of one tag of a git repository, with
//! submodules initialized recursively. Clone and checkout go through gix;
//! submodules are delegated to the `git` CLI.
//!
//! A failed fetch leaves whatever it had written in place. Callers must
//! remove the destination before trying the same revision again.

pub mod patch;

pub use patch::{PatchStatus, apply_patches};

use std::path::{Path, PathBuf};
use std::process::Command;

use gix::ObjectId;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while acquiring sources.
#[derive(Debug, Error)]
pub enum SourceFetchError {
  #[error("invalid fetch request: {0}")]
  InvalidRequest(String),

  #[error("failed to create '{0}': {1}")]
  CreateDir(PathBuf, #[source] std::io::Error),

  #[error("destination '{path}' is not empty and is not a checkout of '{tag}'; remove it and fetch again")]
  DestinationOccupied { path: PathBuf, tag: String },

  #[error("failed to clone '{url}' at '{tag}': {source}")]
  Clone {
    url: String,
    tag: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("failed to check out '{tag}': {source}")]
  Checkout {
    tag: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("failed to open repository at '{path}': {source}")]
  Open {
    path: PathBuf,
    #[source]
    source: Box<gix::open::Error>,
  },

  #[error("tag '{tag}' not found in '{url}'")]
  TagNotFound { url: String, tag: String },

  #[error("git executable not found; it is needed to initialize submodules")]
  GitNotFound,

  #[error("submodule update in '{path}' failed ({status}):\n{stderr}")]
  Submodules {
    path: PathBuf,
    status: String,
    stderr: String,
  },

  #[error("failed to run git in '{path}': {source}")]
  Git {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to patch '{path}': {source}")]
  PatchIo {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("patch for '{file}' does not apply: neither the original nor the patched text is present")]
  PatchNotApplicable { file: String },

  #[error("fetch task did not complete: {0}")]
  Interrupted(String),
}

/// A checkout produced by [`fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSource {
  pub path: PathBuf,
  /// Commit the tag resolves to.
  pub commit: String,
  /// An existing checkout of the same commit was found and kept.
  pub reused: bool,
}

/// Check out `tag` of `url` into `dest`.
///
/// An existing checkout of the same commit is reused. Anything else already
/// at `dest` is an error rather than being overwritten.
pub fn fetch(url: &str, tag: &str, dest: &Path) -> Result<FetchedSource, SourceFetchError> {
  if url.trim().is_empty() {
    return Err(SourceFetchError::InvalidRequest("repository URL is empty".to_string()));
  }
  if tag.trim().is_empty() {
    return Err(SourceFetchError::InvalidRequest("tag is empty".to_string()));
  }

  if let Some(existing) = existing_checkout(url, tag, dest)? {
    info!(path = %dest.display(), commit = %existing.commit, "reusing existing checkout");
    update_submodules(dest)?;
    return Ok(existing);
  }

  if let Some(parent) = dest.parent() {
    std::fs::create_dir_all(parent).map_err(|e| SourceFetchError::CreateDir(parent.to_path_buf(), e))?;
  }

  info!(url, tag, path = %dest.display(), "cloning repository");
  let repo = clone_tag(url, tag, dest)?;
  let commit = resolve_tag(&repo, tag).ok_or_else(|| SourceFetchError::TagNotFound {
    url: url.to_string(),
    tag: tag.to_string(),
  })?;
  debug!(tag, commit = %commit, "resolved tag");

  update_submodules(dest)?;

  Ok(FetchedSource {
    path: dest.to_path_buf(),
    commit: commit.to_string(),
    reused: false,
  })
}

/// Returns the existing checkout at `dest` if it is at `tag`.
fn existing_checkout(url: &str, tag: &str, dest: &Path) -> Result<Option<FetchedSource>, SourceFetchError> {
  if !dest.exists() || is_empty_dir(dest) {
    return Ok(None);
  }

  let occupied = || SourceFetchError::DestinationOccupied {
    path: dest.to_path_buf(),
    tag: tag.to_string(),
  };

  if !dest.join(".git").exists() {
    return Err(occupied());
  }

  debug!(path = %dest.display(), "opening existing repository");
  let repo = gix::open(dest).map_err(|e| SourceFetchError::Open {
    path: dest.to_path_buf(),
    source: Box::new(e),
  })?;

  let head = repo.head_id().map(|id| id.detach()).ok();
  match (resolve_tag(&repo, tag), head) {
    (Some(commit), Some(head)) if commit == head => Ok(Some(FetchedSource {
      path: dest.to_path_buf(),
      commit: commit.to_string(),
      reused: true,
    })),
    (_, head) => {
      debug!(url, tag, head = ?head, "existing checkout is at a different revision");
      Err(occupied())
    }
  }
}

fn clone_tag(url: &str, tag: &str, dest: &Path) -> Result<gix::Repository, SourceFetchError> {
  let clone_err = |source: Box<dyn std::error::Error + Send + Sync>| SourceFetchError::Clone {
    url: url.to_string(),
    tag: tag.to_string(),
    source,
  };

  let prepared = gix::prepare_clone(url, dest).map_err(|e| clone_err(Box::new(e)))?;
  let mut prepared = prepared.with_ref_name(Some(tag)).map_err(|e| clone_err(Box::new(e)))?;

  let (mut checkout, _outcome) = prepared
    .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| clone_err(Box::new(e)))?;

  let (repo, _outcome) = checkout
    .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| SourceFetchError::Checkout {
      tag: tag.to_string(),
      source: Box::new(e),
    })?;

  Ok(repo)
}

/// Peel `tag` to the commit it names.
fn resolve_tag(repo: &gix::Repository, tag: &str) -> Option<ObjectId> {
  repo
    .rev_parse_single(format!("{}^{{commit}}", tag).as_str())
    .ok()
    .map(|id| id.detach())
}

/// `git submodule update --init --recursive`, when the checkout has any.
fn update_submodules(dest: &Path) -> Result<(), SourceFetchError> {
  if !dest.join(".gitmodules").exists() {
    debug!(path = %dest.display(), "no submodules");
    return Ok(());
  }

  let git = which::which("git").map_err(|_| SourceFetchError::GitNotFound)?;
  info!(path = %dest.display(), "updating submodules");

  let output = Command::new(git)
    .arg("-C")
    .arg(dest)
    .args(["submodule", "update", "--init", "--recursive"])
    .output()
    .map_err(|source| SourceFetchError::Git {
      path: dest.to_path_buf(),
      source,
    })?;

  if !output.status.success() {
    return Err(SourceFetchError::Submodules {
      path: dest.to_path_buf(),
      status: output.status.to_string(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    });
  }

  Ok(())
}

fn is_empty_dir(path: &Path) -> bool {
  std::fs::read_dir(path)
    .map(|mut entries| entries.next().is_none())
    .unwrap_or(false)
}
