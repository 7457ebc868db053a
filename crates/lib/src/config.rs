//! Flat kernel configuration parsing.
//!
//! The configuration is a `KEY=VALUE` file, one entry per line. Lines starting
//! with `#` are comments. Only the first `=` separates key from value.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// One `KEY=VALUE` line of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
  pub key: String,
  pub value: String,
  /// 1-based line number in the source file.
  pub line: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read configuration {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("{path}:{line}: invalid line '{content}' (expected KEY=VALUE)")]
  MissingSeparator {
    path: PathBuf,
    line: usize,
    content: String,
  },
}

/// How a driver takes part in the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
  Excluded,
  BuiltIn,
  Module,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized build state marker '{0}' (expected 'y', 'm' or 'n')")]
pub struct UnknownMarker(pub String);

impl BuildState {
  /// Strict marker parse: only `y`, `m` and `n` are accepted.
  pub fn parse(marker: &str) -> Result<Self, UnknownMarker> {
    match marker {
      "y" => Ok(BuildState::BuiltIn),
      "m" => Ok(BuildState::Module),
      "n" => Ok(BuildState::Excluded),
      other => Err(UnknownMarker(other.to_string())),
    }
  }

  /// Lenient classification: anything that is not `n` or `m` is built in.
  pub fn classify(value: &str) -> Self {
    match value {
      "n" => BuildState::Excluded,
      "m" => BuildState::Module,
      _ => BuildState::BuiltIn,
    }
  }
}

impl fmt::Display for BuildState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildState::Excluded => f.write_str("excluded"),
      BuildState::BuiltIn => f.write_str("built-in"),
      BuildState::Module => f.write_str("module"),
    }
  }
}

/// Read and parse the configuration file at `path`.
pub fn read_config(path: &Path) -> Result<Vec<ConfigEntry>, ConfigError> {
  let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  parse_config(&text, path)
}

/// Parse configuration text. `origin` is only used in error messages.
///
/// Comment and whitespace-only lines are skipped. Keys and values are
/// trimmed, which also drops the line terminator.
pub fn parse_config(text: &str, origin: &Path) -> Result<Vec<ConfigEntry>, ConfigError> {
  let mut entries = Vec::new();

  for (idx, raw) in text.lines().enumerate() {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
      continue;
    }

    let Some((key, value)) = trimmed.split_once('=') else {
      return Err(ConfigError::MissingSeparator {
        path: origin.to_path_buf(),
        line: idx + 1,
        content: raw.to_string(),
      });
    };

    entries.push(ConfigEntry {
      key: key.trim().to_string(),
      value: value.trim().to_string(),
      line: idx + 1,
    });
  }

  Ok(entries)
}
