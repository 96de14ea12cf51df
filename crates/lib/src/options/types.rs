use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::configure::InvalidConfigurationError;
use crate::platform::Os;

/// Value of a single option.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
  Bool(bool),
  Text(String),
}

impl OptionValue {
  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Self::Bool(b) => Some(*b),
      Self::Text(_) => None,
    }
  }
}

impl fmt::Display for OptionValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Bool(b) => write!(f, "{}", b),
      Self::Text(s) => write!(f, "{}", s),
    }
  }
}

impl From<bool> for OptionValue {
  fn from(value: bool) -> Self {
    Self::Bool(value)
  }
}

impl From<&str> for OptionValue {
  fn from(value: &str) -> Self {
    Self::Text(value.to_string())
  }
}

/// Domain of an option.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
  /// `true`/`false`, translated to `ON`/`OFF`.
  #[default]
  Bool,
  /// One of a fixed list of strings, passed through unchanged.
  Choice(Vec<String>),
  /// Any string (paths, version numbers), passed through unchanged.
  Text,
}

impl OptionKind {
  pub fn describe(&self) -> String {
    match self {
      Self::Bool => "true or false".to_string(),
      Self::Choice(values) => format!("one of [{}]", values.join(", ")),
      Self::Text => "a string".to_string(),
    }
  }
}

/// Declaration of one option: its domain, default and build variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDecl {
  #[serde(default)]
  pub kind: OptionKind,

  pub default: OptionValue,

  /// Build variable this option is translated to. Options without one are
  /// consumed by the build invoker itself (generator, parallelism).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub variable: Option<String>,

  /// Operating systems on which the option has no meaning.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub unsupported_on: Vec<Os>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

impl OptionDecl {
  /// Boolean option mapped to `variable`.
  pub fn flag(default: bool, variable: &str) -> Self {
    Self {
      kind: OptionKind::Bool,
      default: OptionValue::Bool(default),
      variable: Some(variable.to_string()),
      unsupported_on: Vec::new(),
      description: None,
    }
  }

  /// Boolean option with no build variable.
  pub fn switch(default: bool) -> Self {
    Self {
      kind: OptionKind::Bool,
      default: OptionValue::Bool(default),
      variable: None,
      unsupported_on: Vec::new(),
      description: None,
    }
  }

  /// Enumerated option mapped to `variable`.
  pub fn choice(values: &[&str], default: &str, variable: &str) -> Self {
    Self {
      kind: OptionKind::Choice(values.iter().map(|v| v.to_string()).collect()),
      default: OptionValue::Text(default.to_string()),
      variable: Some(variable.to_string()),
      unsupported_on: Vec::new(),
      description: None,
    }
  }

  pub fn unsupported_on(mut self, os: Os) -> Self {
    self.unsupported_on.push(os);
    self
  }

  pub fn describe(mut self, description: &str) -> Self {
    self.description = Some(description.to_string());
    self
  }

  pub fn is_bool(&self) -> bool {
    matches!(self.kind, OptionKind::Bool)
  }

  pub fn is_supported_on(&self, os: Os) -> bool {
    !self.unsupported_on.contains(&os)
  }

  /// Check that `value` lies inside this option's domain.
  pub fn check(&self, name: &str, value: &OptionValue) -> Result<(), InvalidConfigurationError> {
    let ok = match (&self.kind, value) {
      (OptionKind::Bool, OptionValue::Bool(_)) => true,
      (OptionKind::Choice(values), OptionValue::Text(v)) => values.contains(v),
      (OptionKind::Text, OptionValue::Text(_)) => true,
      _ => false,
    };

    if ok {
      Ok(())
    } else {
      Err(InvalidConfigurationError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
        expected: self.kind.describe(),
      })
    }
  }

  /// Parse a raw command-line value according to this option's kind.
  pub fn parse(&self, name: &str, raw: &str) -> Result<OptionValue, InvalidConfigurationError> {
    let value = match self.kind {
      OptionKind::Bool => match raw.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => OptionValue::Bool(true),
        "false" | "off" | "no" | "0" => OptionValue::Bool(false),
        _ => {
          return Err(InvalidConfigurationError::InvalidValue {
            name: name.to_string(),
            value: raw.to_string(),
            expected: self.kind.describe(),
          });
        }
      },
      OptionKind::Choice(_) | OptionKind::Text => OptionValue::Text(raw.to_string()),
    };
    self.check(name, &value)?;
    Ok(value)
  }
}

/// The declared options of a recipe, keyed and ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionSchema(BTreeMap<String, OptionDecl>);

impl OptionSchema {
  pub fn new() -> Self {
    Self(BTreeMap::new())
  }

  pub fn declare(mut self, name: &str, decl: OptionDecl) -> Self {
    self.0.insert(name.to_string(), decl);
    self
  }

  pub fn get(&self, name: &str) -> Option<&OptionDecl> {
    self.0.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.0.contains_key(name)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionDecl)> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

/// Caller-supplied option values. Options not present take their default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionSet(BTreeMap<String, OptionValue>);

impl OptionSet {
  pub fn new() -> Self {
    Self(BTreeMap::new())
  }

  pub fn with(mut self, name: &str, value: impl Into<OptionValue>) -> Self {
    self.0.insert(name.to_string(), value.into());
    self
  }

  pub fn set(&mut self, name: &str, value: impl Into<OptionValue>) {
    self.0.insert(name.to_string(), value.into());
  }

  pub fn get(&self, name: &str) -> Option<&OptionValue> {
    self.0.get(name)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
    self.0.iter()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Build an option set from `name=value` assignments, typed by `schema`.
  ///
  /// Later assignments of the same name win.
  pub fn from_assignments<I, S>(assignments: I, schema: &OptionSchema) -> Result<Self, InvalidConfigurationError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut set = Self::new();
    for assignment in assignments {
      let assignment = assignment.as_ref();
      let (name, raw) = assignment
        .split_once('=')
        .map(|(n, v)| (n.trim(), v.trim()))
        .filter(|(n, _)| !n.is_empty())
        .ok_or_else(|| InvalidConfigurationError::MalformedAssignment(assignment.to_string()))?;

      let decl = schema
        .get(name)
        .ok_or_else(|| InvalidConfigurationError::UnknownOption { name: name.to_string() })?;
      set.0.insert(name.to_string(), decl.parse(name, raw)?);
    }
    Ok(set)
  }
}

/// Fully resolved option values for one platform.
///
/// Contains every declared option that is supported on the platform, with
/// caller values applied over defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedOptions(BTreeMap<String, OptionValue>);

impl ResolvedOptions {
  pub(crate) fn insert(&mut self, name: &str, value: OptionValue) {
    self.0.insert(name.to_string(), value);
  }

  pub fn get(&self, name: &str) -> Option<&OptionValue> {
    self.0.get(name)
  }

  pub fn flag(&self, name: &str) -> Option<bool> {
    self.0.get(name).and_then(OptionValue::as_bool)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}
