use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::options::{OptionSchema, OptionValue};
use crate::platform::CompilerKind;

/// A package the build needs from the caller's package manager,
/// written `name/version[@user/channel]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Requirement {
  pub name: String,
  pub version: String,
  pub channel: Option<String>,
}

impl Requirement {
  pub fn new(name: &str, version: &str) -> Self {
    Self {
      name: name.to_string(),
      version: version.to_string(),
      channel: None,
    }
  }

  pub fn with_channel(mut self, channel: &str) -> Self {
    self.channel = Some(channel.to_string());
    self
  }
}

impl fmt::Display for Requirement {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.name, self.version)?;
    if let Some(channel) = &self.channel {
      write!(f, "@{}", channel)?;
    }
    Ok(())
  }
}

impl FromStr for Requirement {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (reference, channel) = match s.split_once('@') {
      Some((reference, channel)) => (reference, Some(channel)),
      None => (s, None),
    };
    let (name, version) = reference
      .split_once('/')
      .filter(|(n, v)| !n.is_empty() && !v.is_empty())
      .ok_or_else(|| format!("malformed requirement '{}': expected name/version[@user/channel]", s))?;

    Ok(Self {
      name: name.to_string(),
      version: version.to_string(),
      channel: channel.filter(|c| !c.is_empty()).map(str::to_string),
    })
  }
}

impl TryFrom<String> for Requirement {
  type Error = String;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Requirement> for String {
  fn from(value: Requirement) -> Self {
    value.to_string()
  }
}

fn default_when() -> OptionValue {
  OptionValue::Bool(true)
}

/// "When `option` equals `when`, the build requires `requires`."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementRule {
  pub option: String,
  #[serde(default = "default_when")]
  pub when: OptionValue,
  pub requires: Vec<Requirement>,
}

impl RequirementRule {
  pub fn when(option: &str, value: bool, requires: Vec<Requirement>) -> Self {
    Self {
      option: option.to_string(),
      when: OptionValue::Bool(value),
      requires,
    }
  }
}

/// Minimum version for a compiler family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConstraint {
  pub compiler: CompilerKind,
  pub min_version: u32,
}

/// Literal text replacement applied to a file of the fetched sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePatch {
  /// Path relative to the source checkout.
  pub file: String,
  pub find: String,
  pub replace: String,
}

/// Directory of the work directory a copy rule reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageRoot {
  Source,
  Build,
  Install,
}

fn default_true() -> bool {
  true
}

/// Copy files matching `pattern` under `from` into `dst` of the package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyRule {
  /// Glob matched against paths relative to `from`; `*` crosses directories.
  pub pattern: String,
  pub from: StageRoot,
  /// Destination relative to the package directory; empty for its root.
  #[serde(default)]
  pub dst: String,
  /// Keep the matched path below `dst`, or flatten to the file name.
  #[serde(default = "default_true")]
  pub keep_path: bool,
  /// A required rule that matches nothing fails staging.
  #[serde(default)]
  pub required: bool,
}

impl CopyRule {
  pub fn new(pattern: &str, from: StageRoot, dst: &str) -> Self {
    Self {
      pattern: pattern.to_string(),
      from,
      dst: dst.to_string(),
      keep_path: true,
      required: false,
    }
  }

  pub fn required(mut self) -> Self {
    self.required = true;
    self
  }

  pub fn flatten(mut self) -> Self {
    self.keep_path = false;
    self
  }
}

/// System libraries consumers must link when built with `compiler`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemLibs {
  pub compiler: CompilerKind,
  pub libs: Vec<String>,
}

fn default_lib_dir() -> String {
  "lib".to_string()
}

fn default_include_dir() -> String {
  "include".to_string()
}

fn default_bin_dir() -> String {
  "bin".to_string()
}

/// How build outputs are laid out in the package directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingSpec {
  #[serde(default)]
  pub rules: Vec<CopyRule>,
  #[serde(default)]
  pub system_libs: Vec<SystemLibs>,
  #[serde(default = "default_lib_dir")]
  pub lib_dir: String,
  #[serde(default = "default_include_dir")]
  pub include_dir: String,
  #[serde(default = "default_bin_dir")]
  pub bin_dir: String,
}

impl Default for StagingSpec {
  fn default() -> Self {
    Self {
      rules: Vec::new(),
      system_libs: Vec::new(),
      lib_dir: default_lib_dir(),
      include_dir: default_include_dir(),
      bin_dir: default_bin_dir(),
    }
  }
}

/// Everything needed to fetch, configure, build and stage one library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
  pub name: String,
  pub version: String,
  /// Git URL of the upstream repository.
  pub url: String,
  /// Tag to check out; defaults to `v{version}`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tag: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub license: Option<String>,

  pub options: OptionSchema,
  #[serde(default)]
  pub requirements: Vec<RequirementRule>,
  #[serde(default)]
  pub compilers: Vec<CompilerConstraint>,

  /// Variables applied after option translation, overriding it.
  #[serde(default)]
  pub forced_variables: BTreeMap<String, String>,
  /// Environment of the configure phase.
  #[serde(default)]
  pub configure_env: BTreeMap<String, String>,

  /// Boolean option selecting Ninja over Makefiles.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub generator_option: Option<String>,
  /// Boolean option enabling the build tool's parallel workers.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parallel_option: Option<String>,

  #[serde(default)]
  pub patches: Vec<SourcePatch>,
  #[serde(default)]
  pub staging: StagingSpec,
}
