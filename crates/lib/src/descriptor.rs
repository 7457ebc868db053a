//! Combined build descriptor for built-in drivers.
//!
//! The descriptor is the ordered concatenation of every built-in driver's
//! build fragment. The main kernel build includes it to learn which objects to
//! link in. It is rewritten from scratch on every build and removed on clean.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::Builder;
use thiserror::Error;
use tracing::{debug, info};

/// Name of the build fragment each built-in driver must provide.
pub const FRAGMENT_FILE: &str = "Makefile";

#[derive(Debug, Error)]
pub enum DescriptorError {
  #[error("built-in driver '{driver}' has no build fragment at {path}: {source}")]
  MissingFragment {
    driver: String,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write descriptor {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to remove descriptor {path}: {source}")]
  Remove {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// What an emission produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmitSummary {
  pub path: PathBuf,
  pub drivers: usize,
  pub bytes: u64,
}

/// Write the descriptor for `built_in` drivers to `descriptor_path`.
///
/// Fragments are copied verbatim, in order, into a temporary file next to the
/// descriptor which then replaces it atomically. If any fragment is missing
/// the temporary file is discarded and an existing descriptor is untouched.
/// A replaced descriptor keeps its mode; a new one gets the usual umask mode.
pub fn emit(driver_root: &Path, built_in: &[String], descriptor_path: &Path) -> Result<EmitSummary, DescriptorError> {
  let write_err = |source| DescriptorError::Write {
    path: descriptor_path.to_path_buf(),
    source,
  };

  let dir = match descriptor_path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  #[cfg_attr(not(unix), allow(unused_mut))]
  let mut builder = Builder::new();
  // Created like any other file, subject to the umask.
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    builder.permissions(std::fs::Permissions::from_mode(0o666));
  }
  let temp = builder.tempfile_in(dir).map_err(write_err)?;

  let mut bytes = 0;
  {
    let mut out = BufWriter::new(temp.as_file());
    for driver in built_in {
      let fragment_path = driver_root.join(driver).join(FRAGMENT_FILE);
      let mut fragment = File::open(&fragment_path).map_err(|source| DescriptorError::MissingFragment {
        driver: driver.clone(),
        path: fragment_path.clone(),
        source,
      })?;

      let copied = io::copy(&mut fragment, &mut out).map_err(write_err)?;
      debug!(driver = %driver, bytes = copied, "appended build fragment");
      bytes += copied;
    }
    out.flush().map_err(write_err)?;
  }
  if let Ok(existing) = std::fs::metadata(descriptor_path) {
    temp.as_file().set_permissions(existing.permissions()).map_err(write_err)?;
  }
  temp.as_file().sync_all().map_err(write_err)?;

  temp.persist(descriptor_path).map_err(|e| write_err(e.error))?;

  info!(path = %descriptor_path.display(), drivers = built_in.len(), bytes, "wrote driver descriptor");

  Ok(EmitSummary {
    path: descriptor_path.to_path_buf(),
    drivers: built_in.len(),
    bytes,
  })
}

/// Remove the descriptor. Returns `false` if there was nothing to remove.
pub fn remove_descriptor(descriptor_path: &Path) -> Result<bool, DescriptorError> {
  match std::fs::remove_file(descriptor_path) {
    Ok(()) => {
      info!(path = %descriptor_path.display(), "removed driver descriptor");
      Ok(true)
    }
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      debug!(path = %descriptor_path.display(), "no driver descriptor to remove");
      Ok(false)
    }
    Err(source) => Err(DescriptorError::Remove {
      path: descriptor_path.to_path_buf(),
      source,
    }),
  }
}
