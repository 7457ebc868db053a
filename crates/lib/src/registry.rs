//! Driver discovery.
//!
//! Every immediate subdirectory of the driver tree is a driver. Each one carries
//! a one-line declaration file naming the configuration key that selects it.
//! The registry is built once and never mutated afterwards.

use std::collections::HashSet;
use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the per-driver file declaring its configuration key.
pub const DECLARATION_FILE: &str = "build-config";

/// A discovered driver and the configuration key that selects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverDescriptor {
  pub config_key: String,
  pub directory_name: String,
}

impl DriverDescriptor {
  pub fn new(config_key: impl Into<String>, directory_name: impl Into<String>) -> Self {
    Self {
      config_key: config_key.into(),
      directory_name: directory_name.into(),
    }
  }
}

#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("failed to read driver tree {path}: {source}")]
  ReadRoot {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("driver '{driver}' has no readable declaration file {path}: {source}")]
  MissingDeclaration {
    driver: String,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("driver '{driver}' declares an empty configuration key in {path}")]
  EmptyDeclaration { driver: String, path: PathBuf },

  #[error("driver directory name is not valid UTF-8: {0}")]
  InvalidName(PathBuf),

  #[error("driver '{0}' registered more than once")]
  DuplicateDriver(String),
}

/// Ordered, immutable set of drivers.
///
/// Order is lookup priority: when two drivers declare the same configuration
/// key, only the first one can ever be selected.
#[derive(Debug, Clone, Default)]
pub struct DriverRegistry {
  drivers: Vec<DriverDescriptor>,
}

impl DriverRegistry {
  /// Scan `driver_root` and read every driver's declaration.
  ///
  /// Drivers are registered in directory-listing order, which is not sorted.
  /// Plain files at the top of the tree are ignored.
  pub fn discover(driver_root: &Path) -> Result<Self, RegistryError> {
    let read_root = |source| RegistryError::ReadRoot {
      path: driver_root.to_path_buf(),
      source,
    };

    let mut drivers = Vec::new();
    for entry in fs::read_dir(driver_root).map_err(read_root)? {
      let entry = entry.map_err(read_root)?;
      let path = entry.path();
      if !path.is_dir() {
        continue;
      }

      let directory_name = entry
        .file_name()
        .into_string()
        .map_err(|_| RegistryError::InvalidName(path.clone()))?;
      let config_key = read_declaration(&path, &directory_name)?;

      debug!(driver = %directory_name, key = %config_key, "discovered driver");
      drivers.push(DriverDescriptor::new(config_key, directory_name));
    }

    Self::from_descriptors(drivers)
  }

  /// Build a registry from already known descriptors, keeping their order.
  pub fn from_descriptors(descriptors: impl IntoIterator<Item = DriverDescriptor>) -> Result<Self, RegistryError> {
    let mut names = HashSet::new();
    let mut keys = HashSet::new();
    let mut drivers = Vec::new();

    for descriptor in descriptors {
      if !names.insert(descriptor.directory_name.clone()) {
        return Err(RegistryError::DuplicateDriver(descriptor.directory_name));
      }
      if !keys.insert(descriptor.config_key.clone()) {
        warn!(
          driver = %descriptor.directory_name,
          key = %descriptor.config_key,
          "configuration key already claimed by an earlier driver; this driver cannot be selected"
        );
      }
      drivers.push(descriptor);
    }

    Ok(Self { drivers })
  }

  /// First registered driver whose key equals `config_key`.
  pub fn lookup(&self, config_key: &str) -> Option<&DriverDescriptor> {
    self.drivers.iter().find(|d| d.config_key == config_key)
  }

  pub fn len(&self) -> usize {
    self.drivers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.drivers.is_empty()
  }
}

/// Read the first line of a driver's declaration file.
fn read_declaration(driver_dir: &Path, driver: &str) -> Result<String, RegistryError> {
  let path = driver_dir.join(DECLARATION_FILE);
  let missing = |source| RegistryError::MissingDeclaration {
    driver: driver.to_string(),
    path: path.clone(),
    source,
  };

  let file = fs::File::open(&path).map_err(missing)?;
  let mut line = String::new();
  BufReader::new(file).read_line(&mut line).map_err(missing)?;

  let key = line.trim();
  if key.is_empty() {
    return Err(RegistryError::EmptyDeclaration {
      driver: driver.to_string(),
      path,
    });
  }

  Ok(key.to_string())
}
