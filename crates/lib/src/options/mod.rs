//! Declarative option schema.
//!
//! A recipe declares its options once, with a kind, a default and the build
//! variable each one drives. Callers only supply the values they want to
//! change; [`resolve`] merges those over the defaults for one platform and
//! rejects anything the schema does not allow.

mod types;

pub use types::*;

use tracing::debug;

use crate::configure::InvalidConfigurationError;
use crate::platform::Os;

/// Merge `set` over the defaults of `schema` for `os`.
///
/// - Names missing from the schema are rejected.
/// - Values (and defaults) outside an option's domain are rejected.
/// - An option unsupported on `os` is dropped when left at its default and
///   rejected when the caller set it explicitly.
pub fn resolve(schema: &OptionSchema, set: &OptionSet, os: Os) -> Result<ResolvedOptions, InvalidConfigurationError> {
  if let Some((name, _)) = set.iter().find(|(name, _)| !schema.contains(name)) {
    return Err(InvalidConfigurationError::UnknownOption { name: name.clone() });
  }

  let mut resolved = ResolvedOptions::default();
  for (name, decl) in schema.iter() {
    let explicit = set.get(name);
    let value = explicit.unwrap_or(&decl.default);
    decl.check(name, value)?;

    if !decl.is_supported_on(os) {
      if explicit.is_some() {
        return Err(InvalidConfigurationError::UnsupportedOnPlatform { name: name.clone(), os });
      }
      debug!(option = %name, os = %os, "dropping option unsupported on this platform");
      continue;
    }

    resolved.insert(name, value.clone());
  }

  Ok(resolved)
}
