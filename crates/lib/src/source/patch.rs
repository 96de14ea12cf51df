//! Literal source patches.

use std::path::Path;

use tracing::{debug, info};

use crate::recipe::SourcePatch;
use crate::source::SourceFetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStatus {
  Applied,
  AlreadyApplied,
}

/// Apply `patches` to the checkout at `source_dir`, in order.
///
/// Every occurrence of `find` is replaced. Re-running on a patched tree is
/// a no-op.
pub fn apply_patches(source_dir: &Path, patches: &[SourcePatch]) -> Result<Vec<PatchStatus>, SourceFetchError> {
  patches.iter().map(|patch| apply_patch(source_dir, patch)).collect()
}

fn apply_patch(source_dir: &Path, patch: &SourcePatch) -> Result<PatchStatus, SourceFetchError> {
  let path = source_dir.join(&patch.file);
  let content = std::fs::read_to_string(&path).map_err(|source| SourceFetchError::PatchIo {
    path: path.clone(),
    source,
  })?;

  let has_find = content.contains(&patch.find);
  let has_replace = content.contains(&patch.replace);

  // When the replacement itself contains the search text, a patched file
  // still matches `find`.
  let already = has_replace && (!has_find || patch.replace.contains(&patch.find));
  if already {
    debug!(file = %patch.file, "patch already applied");
    return Ok(PatchStatus::AlreadyApplied);
  }
  if !has_find {
    return Err(SourceFetchError::PatchNotApplicable {
      file: patch.file.clone(),
    });
  }

  let patched = content.replace(&patch.find, &patch.replace);
  std::fs::write(&path, patched).map_err(|source| SourceFetchError::PatchIo {
    path: path.clone(),
    source,
  })?;

  info!(file = %patch.file, "applied patch");
  Ok(PatchStatus::Applied)
}
