//! Configuration resolution.
//!
//! Walks the configuration entries in file order and sorts every registered
//! driver into built-in or module. Keys with no registered driver are ordinary
//! kernel options and are skipped.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{BuildState, ConfigEntry, ConfigError, read_config};
use crate::registry::DriverRegistry;

/// Drivers selected for this build, in configuration-file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedSelection {
  pub built_in: Vec<String>,
  pub modules: Vec<String>,
}

impl ResolvedSelection {
  pub fn is_empty(&self) -> bool {
    self.built_in.is_empty() && self.modules.is_empty()
  }
}

/// Resolution settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
  /// Reject driver values other than `y`, `m` and `n` instead of treating
  /// them as built in.
  pub strict_markers: bool,
}

#[derive(Debug, Error)]
pub enum ResolveError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("line {line}: driver key {key} has unrecognized value '{value}' (expected 'y', 'm' or 'n')")]
  UnknownMarker { key: String, value: String, line: usize },
}

/// Read `config_path` and resolve it against `registry`.
pub fn resolve(
  config_path: &Path,
  registry: &DriverRegistry,
  options: ResolveOptions,
) -> Result<ResolvedSelection, ResolveError> {
  let entries = read_config(config_path)?;
  resolve_entries(&entries, registry, options)
}

/// Resolve already parsed entries against `registry`.
pub fn resolve_entries(
  entries: &[ConfigEntry],
  registry: &DriverRegistry,
  options: ResolveOptions,
) -> Result<ResolvedSelection, ResolveError> {
  let mut selection = ResolvedSelection::default();

  for entry in entries {
    let Some(driver) = registry.lookup(&entry.key) else {
      continue;
    };

    let state = if options.strict_markers {
      BuildState::parse(&entry.value).map_err(|_| ResolveError::UnknownMarker {
        key: entry.key.clone(),
        value: entry.value.clone(),
        line: entry.line,
      })?
    } else {
      BuildState::classify(&entry.value)
    };

    debug!(driver = %driver.directory_name, key = %entry.key, state = %state, "resolved driver");

    match state {
      BuildState::Excluded => {}
      BuildState::BuiltIn => selection.built_in.push(driver.directory_name.clone()),
      BuildState::Module => selection.modules.push(driver.directory_name.clone()),
    }
  }

  info!(
    built_in = selection.built_in.len(),
    modules = selection.modules.len(),
    "resolved driver selection"
  );

  Ok(selection)
}
