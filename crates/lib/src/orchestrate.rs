//! One `build` or `clean` run of the driver subsystem.
//!
//! Order of operations:
//! 1. Discover the driver registry
//! 2. Resolve the kernel configuration against it
//! 3. Write (build) or remove (clean) the driver descriptor
//! 4. Dispatch the module sub-builds with the matching target
//!
//! Steps 1 and 2 fail before anything touches the filesystem, so a broken
//! configuration never leaves a partial descriptor or a half-built module set.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::action::Action;
use crate::descriptor::{self, DescriptorError, EmitSummary};
use crate::dispatch::{self, CancelSignal, DispatchConfig, DispatchReport, SubBuildOutcome};
use crate::registry::{DriverRegistry, RegistryError};
use crate::resolve::{self, ResolveError, ResolveOptions, ResolvedSelection};

/// Default driver tree, relative to the kernel source directory.
pub const DEFAULT_DRIVER_ROOT: &str = "drivers";
/// Default configuration file, relative to the kernel source directory.
pub const DEFAULT_CONFIG_FILE: &str = "kernel.config";
/// Default descriptor path, relative to the kernel source directory.
pub const DEFAULT_DESCRIPTOR_FILE: &str = "drivers.config";

/// Where the inputs and the output of a run live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layout {
  pub driver_root: PathBuf,
  pub config_file: PathBuf,
  pub descriptor_file: PathBuf,
}

impl Layout {
  /// The standard layout below `base`.
  pub fn in_dir(base: &Path) -> Self {
    Self {
      driver_root: base.join(DEFAULT_DRIVER_ROOT),
      config_file: base.join(DEFAULT_CONFIG_FILE),
      descriptor_file: base.join(DEFAULT_DESCRIPTOR_FILE),
    }
  }
}

/// Options for a single run.
#[derive(Debug, Clone)]
pub struct OrchestrateOptions {
  pub layout: Layout,
  pub resolve: ResolveOptions,
  pub dispatch: DispatchConfig,
  /// Stop after resolution: no descriptor changes, no sub-builds.
  pub dry_run: bool,
}

impl OrchestrateOptions {
  pub fn new(layout: Layout) -> Self {
    Self {
      layout,
      resolve: ResolveOptions::default(),
      dispatch: DispatchConfig::default(),
      dry_run: false,
    }
  }
}

#[derive(Debug, Error)]
pub enum OrchestrateError {
  #[error(transparent)]
  Registry(#[from] RegistryError),

  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error(transparent)]
  Descriptor(#[from] DescriptorError),
}

/// What happened to the descriptor during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum DescriptorChange {
  Written(EmitSummary),
  Removed { path: PathBuf },
  AlreadyAbsent { path: PathBuf },
  Untouched,
}

/// Everything a run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub action: Action,
  pub dry_run: bool,
  pub drivers_discovered: usize,
  pub selection: ResolvedSelection,
  pub descriptor: DescriptorChange,
  pub dispatch: DispatchReport,
}

impl RunReport {
  /// Returns true if every sub-build succeeded.
  pub fn is_success(&self) -> bool {
    self.dispatch.is_success()
  }

  pub fn first_failure(&self) -> Option<&SubBuildOutcome> {
    self.dispatch.first_failure()
  }
}

/// Perform `action` with `options`.
///
/// Fatal errors (corrupt driver tree, malformed configuration, missing build
/// fragment) are returned as `Err`. Sub-build failures are not errors here;
/// they are reported in `RunReport::dispatch` and make `is_success` false.
pub async fn run(action: Action, options: &OrchestrateOptions, cancel: &CancelSignal) -> Result<RunReport, OrchestrateError> {
  let layout = &options.layout;
  info!(action = %action, root = %layout.driver_root.display(), "starting driver run");

  let registry = DriverRegistry::discover(&layout.driver_root)?;
  if registry.is_empty() {
    warn!(root = %layout.driver_root.display(), "driver tree holds no drivers");
  } else {
    info!(drivers = registry.len(), "discovered drivers");
  }

  let selection = resolve::resolve(&layout.config_file, &registry, options.resolve)?;

  if options.dry_run {
    return Ok(RunReport {
      action,
      dry_run: true,
      drivers_discovered: registry.len(),
      selection,
      descriptor: DescriptorChange::Untouched,
      dispatch: DispatchReport::empty(action),
    });
  }

  let descriptor = match action {
    Action::Build => DescriptorChange::Written(descriptor::emit(
      &layout.driver_root,
      &selection.built_in,
      &layout.descriptor_file,
    )?),
    Action::Clean => {
      let path = layout.descriptor_file.clone();
      if descriptor::remove_descriptor(&path)? {
        DescriptorChange::Removed { path }
      } else {
        DescriptorChange::AlreadyAbsent { path }
      }
    }
  };

  let dispatch = dispatch::dispatch(
    &layout.driver_root,
    &selection.modules,
    action,
    &options.dispatch,
    cancel,
  )
  .await;

  Ok(RunReport {
    action,
    dry_run: false,
    drivers_discovered: registry.len(),
    selection,
    descriptor,
    dispatch,
  })
}
