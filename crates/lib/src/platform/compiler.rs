//! Compiler identity and version detection.

use std::fmt;
use std::path::Path;
use std::process::Command;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::platform::{Os, PlatformError};

/// Compiler families a recipe can constrain on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompilerKind {
  Gcc,
  Clang,
  AppleClang,
  #[serde(alias = "VisualStudio", alias = "msvc")]
  VisualStudio,
}

impl CompilerKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Gcc => "gcc",
      Self::Clang => "clang",
      Self::AppleClang => "apple-clang",
      Self::VisualStudio => "visual-studio",
    }
  }

  /// The compiler a fresh toolchain on `os` most likely provides.
  pub fn default_for(os: Os) -> Self {
    match os {
      Os::Linux => Self::Gcc,
      Os::MacOs => Self::AppleClang,
      Os::Windows => Self::VisualStudio,
    }
  }

  fn default_program(&self) -> &'static str {
    match self {
      Self::Gcc => "g++",
      Self::Clang | Self::AppleClang => "clang++",
      Self::VisualStudio => "cl",
    }
  }

  /// Executables searched on `PATH` when `$CXX` is not set, in order.
  fn candidates(os: Os) -> &'static [&'static str] {
    match os {
      Os::Linux => &["g++", "clang++", "c++"],
      Os::MacOs => &["clang++", "c++"],
      Os::Windows => &["cl"],
    }
  }

  /// Guess the family from a compiler executable path such as `$CXX`.
  fn from_program(program: &str, os: Os) -> Option<Self> {
    let stem = Path::new(program).file_stem()?.to_string_lossy().to_ascii_lowercase();
    if stem.contains("clang") {
      Some(if os == Os::MacOs { Self::AppleClang } else { Self::Clang })
    } else if stem.contains("g++") || stem.contains("gcc") {
      Some(Self::Gcc)
    } else if stem == "cl" {
      Some(Self::VisualStudio)
    } else {
      None
    }
  }
}

impl fmt::Display for CompilerKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for CompilerKind {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let normalized: String = s
      .chars()
      .filter(|c| !matches!(c, ' ' | '-' | '_'))
      .collect::<String>()
      .to_ascii_lowercase();
    match normalized.as_str() {
      "gcc" => Ok(Self::Gcc),
      "clang" => Ok(Self::Clang),
      "appleclang" => Ok(Self::AppleClang),
      "visualstudio" | "msvc" => Ok(Self::VisualStudio),
      _ => Err(PlatformError::UnknownCompiler(s.to_string())),
    }
  }
}

/// A compiler family together with its major version.
///
/// Visual Studio versions use the toolset numbering (14 = 2015, 15 = 2017,
/// 16 = 2019, 17 = 2022), which is also what `VisualStudioVersion` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Compiler {
  pub kind: CompilerKind,
  pub version: u32,
}

impl Compiler {
  pub fn new(kind: CompilerKind, version: u32) -> Self {
    Self { kind, version }
  }

  /// Detect the compiler used for builds on `os`.
  ///
  /// `$CXX` names the compiler when set; otherwise the first of the
  /// platform's usual executables found on `PATH` is used. The family is
  /// guessed from the executable name, falling back to the platform default.
  /// The version comes from `VisualStudioVersion` for Visual Studio and from
  /// `<cxx> -dumpversion` for everything else.
  pub fn detect(os: Os) -> Result<Self, PlatformError> {
    let cxx = std::env::var("CXX").ok().filter(|v| !v.is_empty()).or_else(|| {
      CompilerKind::candidates(os)
        .iter()
        .find_map(|name| which::which(name).ok())
        .map(|path| path.display().to_string())
    });
    let kind = cxx
      .as_deref()
      .and_then(|program| CompilerKind::from_program(program, os))
      .unwrap_or_else(|| CompilerKind::default_for(os));

    let version = match kind {
      CompilerKind::VisualStudio => {
        let raw = std::env::var("VisualStudioVersion").map_err(|_| PlatformError::CompilerVersion {
          program: "cl".to_string(),
          message: "VisualStudioVersion is not set; run from a developer prompt or pass --compiler-version".to_string(),
        })?;
        parse_major(&raw).ok_or_else(|| PlatformError::CompilerVersion {
          program: "cl".to_string(),
          message: format!("unrecognized VisualStudioVersion '{}'", raw),
        })?
      }
      _ => {
        let program = cxx.ok_or_else(|| PlatformError::CompilerVersion {
          program: kind.default_program().to_string(),
          message: "no C++ compiler found on PATH; set CXX or pass --compiler-version".to_string(),
        })?;
        dump_version(&program)?
      }
    };

    debug!(compiler = %kind, version, "detected compiler");
    Ok(Self { kind, version })
  }
}

impl fmt::Display for Compiler {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.kind, self.version)
  }
}

fn dump_version(program: &str) -> Result<u32, PlatformError> {
  let output = Command::new(program)
    .arg("-dumpversion")
    .output()
    .map_err(|e| PlatformError::CompilerVersion {
      program: program.to_string(),
      message: e.to_string(),
    })?;

  let stdout = String::from_utf8_lossy(&output.stdout);
  if !output.status.success() {
    return Err(PlatformError::CompilerVersion {
      program: program.to_string(),
      message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    });
  }

  parse_major(stdout.trim()).ok_or_else(|| PlatformError::CompilerVersion {
    program: program.to_string(),
    message: format!("unrecognized version output '{}'", stdout.trim()),
  })
}

/// Leading integer of a dotted version string ("16.0" -> 16).
pub fn parse_major(raw: &str) -> Option<u32> {
  let digits: String = raw.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
  digits.parse().ok()
}
