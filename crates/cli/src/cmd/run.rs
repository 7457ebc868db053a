//! Implementation of the `driver-build build|clean` command.
//!
//! Resolves the driver selection from the kernel configuration, updates the
//! driver descriptor and runs the module sub-builds, then prints a summary.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tokio::task::JoinHandle;
use tracing::warn;

use drvbuild_lib::action::Action;
use drvbuild_lib::dispatch::{BuildTool, CancelSignal, DispatchConfig};
use drvbuild_lib::orchestrate::{self, DescriptorChange, Layout, OrchestrateOptions, RunReport};
use drvbuild_lib::resolve::ResolveOptions;

use crate::output::{
  OutputFormat, format_bytes, format_list, print_error, print_info, print_json, print_outcome, print_stat, print_success,
};

/// Arguments of a run, as given on the command line.
#[derive(Debug)]
pub struct RunArgs {
  pub action: Action,
  pub directory: PathBuf,
  pub config: Option<PathBuf>,
  pub drivers: Option<PathBuf>,
  pub descriptor: Option<PathBuf>,
  pub jobs: Option<NonZeroUsize>,
  pub make: Option<String>,
  pub fail_fast: bool,
  pub strict_markers: bool,
  pub dry_run: bool,
}

impl RunArgs {
  /// Layer the command line over the defaults.
  ///
  /// Returns the canonical kernel source directory along with the options.
  fn options(&self) -> Result<(PathBuf, OrchestrateOptions)> {
    let base = dunce::canonicalize(&self.directory)
      .with_context(|| format!("Failed to open directory {}", self.directory.display()))?;

    let mut layout = Layout::in_dir(&base);
    if let Some(path) = &self.config {
      layout.config_file = base.join(path);
    }
    if let Some(path) = &self.drivers {
      layout.driver_root = base.join(path);
    }
    if let Some(path) = &self.descriptor {
      layout.descriptor_file = base.join(path);
    }

    let mut dispatch = DispatchConfig {
      fail_fast: self.fail_fast,
      ..DispatchConfig::default()
    };
    if let Some(jobs) = self.jobs {
      dispatch.parallelism = jobs.get();
    }
    if let Some(line) = &self.make {
      dispatch.tool = BuildTool::from_command_line(line).ok_or_else(|| anyhow!("--make must name a program"))?;
    }

    let options = OrchestrateOptions {
      layout,
      resolve: ResolveOptions {
        strict_markers: self.strict_markers,
      },
      dispatch,
      dry_run: self.dry_run,
    };
    Ok((base, options))
  }
}

/// Execute the run.
///
/// Returns `Ok(false)` when the run completed but a module sub-build did not
/// succeed. Fatal errors are returned as `Err`.
pub fn cmd_run(args: RunArgs, output: OutputFormat) -> Result<bool> {
  let (base, options) = args.options()?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report: Result<RunReport> = rt.block_on(async {
    let cancel = CancelSignal::new();
    let shutdown = watch_shutdown(cancel.clone())?;

    let result = orchestrate::run(args.action, &options, &cancel).await;
    shutdown.abort();
    result.with_context(|| format!("driver {} failed", args.action))
  });
  let report = report?;

  if output.is_json() {
    print_json(&report)?;
  } else {
    print_report(&report, &base);
  }

  if report.is_success() {
    return Ok(true);
  }
  if !output.is_json()
    && let Some(failure) = report.first_failure()
  {
    print_error(&format!("Module driver '{}' {}", failure.driver, failure.status));
  }
  Ok(false)
}

/// Fire `cancel` on the first SIGINT, SIGTERM or SIGHUP.
///
/// Handlers are installed before this returns.
#[cfg(unix)]
fn watch_shutdown(cancel: CancelSignal) -> Result<JoinHandle<()>> {
  use tokio::signal::unix::{SignalKind, signal};

  let mut interrupt = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
  let mut terminate = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
  let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;

  Ok(tokio::spawn(async move {
    let name = tokio::select! {
      _ = interrupt.recv() => "SIGINT",
      _ = terminate.recv() => "SIGTERM",
      _ = hangup.recv() => "SIGHUP",
    };
    warn!(signal = name, "cancelling module sub-builds");
    cancel.cancel();
  }))
}

#[cfg(not(unix))]
fn watch_shutdown(cancel: CancelSignal) -> Result<JoinHandle<()>> {
  Ok(tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupted, cancelling module sub-builds");
      cancel.cancel();
    }
  }))
}

fn print_report(report: &RunReport, base: &Path) {
  println!();
  if report.dry_run {
    print_info("Dry run - no changes made");
  }
  print_stat("Action", report.action.as_str());
  print_stat("Drivers discovered", &report.drivers_discovered.to_string());
  print_stat("Built-in", &format_list(&report.selection.built_in));
  print_stat("Modules", &format_list(&report.selection.modules));
  if report.selection.is_empty() {
    print_info("No drivers selected");
  }

  match &report.descriptor {
    DescriptorChange::Written(summary) => print_success(&format!(
      "Wrote {} ({} driver(s), {})",
      display_relative(&summary.path, base),
      summary.drivers,
      format_bytes(summary.bytes)
    )),
    DescriptorChange::Removed { path } => print_success(&format!("Removed {}", display_relative(path, base))),
    DescriptorChange::AlreadyAbsent { path } => {
      print_info(&format!("{} already absent", display_relative(path, base)))
    }
    DescriptorChange::Untouched => {}
  }

  for outcome in &report.dispatch.outcomes {
    print_outcome(outcome);
  }
}

/// Show `path` relative to the kernel source directory when possible.
fn display_relative(path: &Path, base: &Path) -> String {
  path.strip_prefix(base).unwrap_or(path).display().to_string()
}
