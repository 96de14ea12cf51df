//! Artifact staging.
//!
//! [`stage`] copies build outputs selected by a recipe's [`CopyRule`]s into a
//! package directory, then derives the metadata consumers need (library
//! names, search paths, extra link libraries, environment additions) and
//! writes it next to the files as `buildstage-package.json`.

use std::collections::{BTreeMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::consts::PACKAGE_INFO_FILE;
use crate::platform::{Os, PlatformContext};
use crate::recipe::{CopyRule, StagingSpec};
use crate::workdir::Workdir;

const LIBRARY_EXTENSIONS: &[&str] = &["so", "a", "lib", "dylib"];

/// `*` crosses directory separators, like the package-manager copy
/// patterns recipes are written against.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
  case_sensitive: true,
  require_literal_separator: false,
  require_literal_leading_dot: false,
};

#[derive(Debug, Error)]
pub enum StagingError {
  #[error("required file pattern '{pattern}' matched nothing in {root}")]
  MissingRequired { pattern: String, root: PathBuf },

  #[error("invalid file pattern '{pattern}': {message}")]
  InvalidPattern { pattern: String, message: String },

  #[error("output directory {0} already contains files that were not staged by buildstage")]
  OutdirOccupied(PathBuf),

  #[error("failed to scan {path}: {message}")]
  Walk { path: PathBuf, message: String },

  #[error("failed to copy {from} to {to}: {source}")]
  Copy {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
  Library,
  Header,
  DebugSymbols,
  License,
  Binary,
  Other,
}

/// One file in the package directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedFile {
  pub kind: ArtifactKind,
  /// Path relative to the package directory.
  pub path: PathBuf,
}

/// What a consumer needs to link against the package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
  /// Library names, without `lib` prefix (outside Windows) or extension.
  pub libs: Vec<String>,
  /// Platform libraries that must be linked in addition to `libs`.
  pub system_libs: Vec<String>,
  pub lib_dirs: Vec<String>,
  pub include_dirs: Vec<String>,
  pub bin_dirs: Vec<String>,
  /// Paths to append to environment variables at run time.
  pub env_append: BTreeMap<String, Vec<PathBuf>>,
}

/// The staged package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifactSet {
  pub outdir: PathBuf,
  pub files: Vec<StagedFile>,
  pub package: PackageInfo,
}

impl BuildArtifactSet {
  pub fn files_of(&self, kind: ArtifactKind) -> impl Iterator<Item = &StagedFile> {
    self.files.iter().filter(move |f| f.kind == kind)
  }
}

/// Copy the outputs selected by `spec` from `workdir` into `outdir`.
///
/// A previous package in `outdir` is replaced. A required rule that matches
/// nothing fails staging; optional rules that match nothing are skipped.
///
/// Files are collected in a sibling directory and moved into place only once
/// everything was copied, so a failed run leaves `outdir` as it was.
pub fn stage(
  workdir: &Workdir,
  outdir: &Path,
  spec: &StagingSpec,
  platform: &PlatformContext,
) -> Result<BuildArtifactSet, StagingError> {
  check_outdir(outdir)?;

  let scratch = scratch_dir(outdir);
  reset_dir(&scratch)?;

  let artifacts = match stage_into(workdir, &scratch, outdir, spec, platform) {
    Ok(artifacts) => artifacts,
    Err(e) => {
      if let Err(cleanup) = std::fs::remove_dir_all(&scratch) {
        warn!(path = %scratch.display(), error = %cleanup, "failed to remove partial package");
      }
      return Err(e);
    }
  };

  publish(&scratch, outdir)?;

  info!(
    outdir = %outdir.display(),
    files = artifacts.files.len(),
    libs = artifacts.package.libs.len(),
    "staged package"
  );
  Ok(artifacts)
}

/// Stage into `scratch`, recording paths as they will be under `outdir`.
fn stage_into(
  workdir: &Workdir,
  scratch: &Path,
  outdir: &Path,
  spec: &StagingSpec,
  platform: &PlatformContext,
) -> Result<BuildArtifactSet, StagingError> {
  let mut files = Vec::new();
  let mut seen = HashSet::new();

  for rule in &spec.rules {
    let root = workdir.stage_root(rule.from);
    let matches = find_matches(&root, rule)?;

    if matches.is_empty() {
      if rule.required {
        return Err(StagingError::MissingRequired {
          pattern: rule.pattern.clone(),
          root,
        });
      }
      debug!(pattern = %rule.pattern, root = %root.display(), "optional pattern matched nothing");
      continue;
    }

    for relative in matches {
      let destination = destination_for(rule, &relative);
      if !seen.insert(destination.clone()) {
        continue;
      }

      copy_file(&root.join(&relative), &scratch.join(&destination))?;
      files.push(StagedFile {
        kind: classify(&destination, spec),
        path: destination,
      });
    }
  }

  let package = PackageInfo {
    libs: collect_libs(&scratch.join(&spec.lib_dir), platform.os)?,
    system_libs: spec
      .system_libs
      .iter()
      .filter(|s| s.compiler == platform.compiler.kind)
      .flat_map(|s| s.libs.iter().cloned())
      .collect(),
    lib_dirs: vec![spec.lib_dir.clone()],
    include_dirs: vec![spec.include_dir.clone()],
    bin_dirs: vec![spec.bin_dir.clone()],
    env_append: BTreeMap::from([("PATH".to_string(), vec![outdir.join(&spec.bin_dir)])]),
  };

  let artifacts = BuildArtifactSet {
    outdir: outdir.to_path_buf(),
    files,
    package,
  };
  write_package_info(scratch, &artifacts)?;
  Ok(artifacts)
}

/// Refuse to stage over a non-empty directory that holds no package.
fn check_outdir(outdir: &Path) -> Result<(), StagingError> {
  if outdir.join(PACKAGE_INFO_FILE).is_file() {
    return Ok(());
  }
  match std::fs::read_dir(outdir) {
    Ok(mut entries) => match entries.next() {
      Some(_) => Err(StagingError::OutdirOccupied(outdir.to_path_buf())),
      None => Ok(()),
    },
    _ => Ok(()),
  }
}

/// `.<name>.staging` next to `outdir`.
fn scratch_dir(outdir: &Path) -> PathBuf {
  let mut name = OsString::from(".");
  name.push(outdir.file_name().unwrap_or(OsStr::new("package")));
  name.push(".staging");
  outdir.with_file_name(name)
}

fn reset_dir(dir: &Path) -> Result<(), StagingError> {
  let write_err = |source| StagingError::Write {
    path: dir.to_path_buf(),
    source,
  };
  match std::fs::remove_dir_all(dir) {
    Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(write_err(e)),
    _ => {}
  }
  std::fs::create_dir_all(dir).map_err(write_err)
}

/// Replace `outdir` with the finished `scratch` directory.
fn publish(scratch: &Path, outdir: &Path) -> Result<(), StagingError> {
  let write_err = |source| StagingError::Write {
    path: outdir.to_path_buf(),
    source,
  };
  if outdir.exists() {
    debug!(outdir = %outdir.display(), "replacing previous package");
    std::fs::remove_dir_all(outdir).map_err(write_err)?;
  }
  std::fs::rename(scratch, outdir).map_err(write_err)
}

/// Paths under `root`, relative to it, matching the rule's pattern.
fn find_matches(root: &Path, rule: &CopyRule) -> Result<Vec<PathBuf>, StagingError> {
  let pattern = Pattern::new(&rule.pattern).map_err(|e| StagingError::InvalidPattern {
    pattern: rule.pattern.clone(),
    message: e.to_string(),
  })?;

  if !rule.pattern.contains(['*', '?', '[']) {
    let relative = PathBuf::from(&rule.pattern);
    return Ok(if root.join(&relative).is_file() {
      vec![relative]
    } else {
      Vec::new()
    });
  }

  // Only descend below the pattern's literal leading directories.
  let prefix = literal_prefix(&rule.pattern);
  let start = root.join(&prefix);
  if !start.exists() {
    return Ok(Vec::new());
  }

  let mut matches = Vec::new();
  let walker = WalkDir::new(&start)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| e.file_name() != ".git");

  for entry in walker {
    let entry = entry.map_err(|e| StagingError::Walk {
      path: start.clone(),
      message: e.to_string(),
    })?;
    if entry.file_type().is_dir() {
      continue;
    }

    let Ok(relative) = entry.path().strip_prefix(root) else {
      continue;
    };
    if pattern.matches_path_with(relative, MATCH_OPTIONS) {
      matches.push(relative.to_path_buf());
    }
  }

  Ok(matches)
}

/// Leading directories of `pattern` that contain no glob syntax.
fn literal_prefix(pattern: &str) -> PathBuf {
  let mut prefix = PathBuf::new();
  let mut components = pattern.split('/').peekable();
  while let Some(component) = components.next() {
    // The last component names files, not a directory to descend into.
    if components.peek().is_none() || component.contains(['*', '?', '[']) {
      break;
    }
    prefix.push(component);
  }
  prefix
}

fn destination_for(rule: &CopyRule, relative: &Path) -> PathBuf {
  let base = PathBuf::from(&rule.dst);
  if rule.keep_path {
    base.join(relative)
  } else {
    match relative.file_name() {
      Some(name) => base.join(name),
      None => base.join(relative),
    }
  }
}

fn classify(path: &Path, spec: &StagingSpec) -> ArtifactKind {
  let first = path.components().next().and_then(|c| match c {
    Component::Normal(s) => s.to_str(),
    _ => None,
  });
  let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
  let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

  if first == Some("licenses") || name.starts_with("LICENSE") || name.starts_with("COPYING") {
    ArtifactKind::License
  } else if extension.eq_ignore_ascii_case("pdb") {
    ArtifactKind::DebugSymbols
  } else if LIBRARY_EXTENSIONS.contains(&extension) || name.contains(".so.") || extension == "dll" {
    ArtifactKind::Library
  } else if first == Some(spec.include_dir.as_str()) {
    ArtifactKind::Header
  } else if first == Some(spec.bin_dir.as_str()) {
    ArtifactKind::Binary
  } else {
    ArtifactKind::Other
  }
}

/// Library names found directly in `lib_dir`, sorted and deduplicated.
pub fn collect_libs(lib_dir: &Path, os: Os) -> Result<Vec<String>, StagingError> {
  let entries = match std::fs::read_dir(lib_dir) {
    Ok(entries) => entries,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(e) => {
      return Err(StagingError::Walk {
        path: lib_dir.to_path_buf(),
        message: e.to_string(),
      });
    }
  };

  let mut libs: Vec<String> = entries
    .filter_map(Result::ok)
    .map(|entry| entry.path())
    .filter(|path| path.is_file())
    .filter_map(|path| library_name(&path, os))
    .collect();
  libs.sort();
  libs.dedup();
  Ok(libs)
}

fn library_name(path: &Path, os: Os) -> Option<String> {
  let extension = path.extension()?.to_str()?;
  if !LIBRARY_EXTENSIONS.contains(&extension) {
    return None;
  }
  let stem = path.file_stem()?.to_str()?;
  let name = match os {
    Os::Windows => stem,
    _ => stem.strip_prefix("lib").filter(|s| !s.is_empty()).unwrap_or(stem),
  };
  Some(name.to_string())
}

fn copy_file(from: &Path, to: &Path) -> Result<(), StagingError> {
  let copy_err = |source| StagingError::Copy {
    from: from.to_path_buf(),
    to: to.to_path_buf(),
    source,
  };

  if let Some(parent) = to.parent() {
    std::fs::create_dir_all(parent).map_err(copy_err)?;
  }

  #[cfg(unix)]
  if from.is_symlink() {
    let target = std::fs::read_link(from).map_err(copy_err)?;
    match std::fs::remove_file(to) {
      Err(e) if e.kind() != io::ErrorKind::NotFound => {
        return Err(StagingError::Write {
          path: to.to_path_buf(),
          source: e,
        });
      }
      _ => {}
    }
    return std::os::unix::fs::symlink(target, to).map_err(copy_err);
  }

  std::fs::copy(from, to).map(|_| ()).map_err(copy_err)
}

fn write_package_info(outdir: &Path, artifacts: &BuildArtifactSet) -> Result<(), StagingError> {
  let path = outdir.join(PACKAGE_INFO_FILE);
  let json = serde_json::to_string_pretty(artifacts).map_err(|e| StagingError::Write {
    path: path.clone(),
    source: io::Error::other(e),
  })?;
  std::fs::write(&path, json).map_err(|source| StagingError::Write { path, source })
}
