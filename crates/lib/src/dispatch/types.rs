//! Types for module sub-build dispatch.
//!
//! This module defines the build tool description, the dispatcher
//! configuration, and the per-driver and aggregate results.

use std::fmt;

use serde::Serialize;

use crate::action::Action;

/// Environment variable naming the build tool, as understood by make itself.
pub const MAKE_ENV: &str = "MAKE";

/// The external program used to run a driver's own build.
///
/// Each invocation appends `-j<jobs> -C <driver dir> <target>` to `args`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTool {
  pub program: String,
  pub args: Vec<String>,
}

impl BuildTool {
  pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = String>) -> Self {
    Self {
      program: program.into(),
      args: args.into_iter().collect(),
    }
  }

  /// Split a whitespace separated command line such as `gmake -s`.
  ///
  /// Returns `None` for a blank command line.
  pub fn from_command_line(line: &str) -> Option<Self> {
    let mut parts = line.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    Some(Self::new(program, parts))
  }

  /// `$MAKE` if set and non-blank, otherwise plain `make`.
  pub fn from_env() -> Self {
    std::env::var(MAKE_ENV)
      .ok()
      .and_then(|line| Self::from_command_line(&line))
      .unwrap_or_default()
  }
}

impl Default for BuildTool {
  fn default() -> Self {
    Self::new("make", Vec::new())
  }
}

impl fmt::Display for BuildTool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.program)?;
    for arg in &self.args {
      write!(f, " {arg}")?;
    }
    Ok(())
  }
}

/// Configuration for module sub-build dispatch.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
  /// Processing units shared by all concurrently running sub-builds.
  pub parallelism: usize,

  /// Program used to run each driver's build.
  pub tool: BuildTool,

  /// Cancel the remaining sub-builds as soon as one fails.
  pub fail_fast: bool,
}

impl Default for DispatchConfig {
  fn default() -> Self {
    Self {
      parallelism: num_cpus(),
      tool: BuildTool::from_env(),
      fail_fast: false,
    }
  }
}

/// Get the number of CPUs for default parallelism.
pub fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

/// How the processing units are split between concurrent sub-builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerPlan {
  /// Sub-builds allowed to run at the same time.
  pub workers: usize,
  /// Concurrency hint passed to each sub-build.
  pub jobs_per_build: usize,
}

impl WorkerPlan {
  pub fn new(parallelism: usize, drivers: usize) -> Self {
    let parallelism = parallelism.max(1);
    let workers = parallelism.min(drivers).max(1);
    Self {
      workers,
      jobs_per_build: (parallelism / workers).max(1),
    }
  }
}

/// How a single module sub-build ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubBuildStatus {
  Succeeded,
  /// The build tool exited unsuccessfully. `code` is `None` when it was
  /// killed by a signal.
  Failed { code: Option<i32> },
  /// The build tool could not be started.
  SpawnFailed { message: String },
  /// Never started, or terminated, because the run was cancelled.
  Cancelled,
}

impl SubBuildStatus {
  pub fn is_success(&self) -> bool {
    matches!(self, SubBuildStatus::Succeeded)
  }

  /// Failed on its own account, as opposed to being cancelled.
  pub fn is_failure(&self) -> bool {
    matches!(self, SubBuildStatus::Failed { .. } | SubBuildStatus::SpawnFailed { .. })
  }
}

impl fmt::Display for SubBuildStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SubBuildStatus::Succeeded => f.write_str("succeeded"),
      SubBuildStatus::Failed { code: Some(code) } => write!(f, "failed with exit code {code}"),
      SubBuildStatus::Failed { code: None } => f.write_str("terminated by signal"),
      SubBuildStatus::SpawnFailed { message } => write!(f, "could not be started: {message}"),
      SubBuildStatus::Cancelled => f.write_str("cancelled"),
    }
  }
}

/// Result of one module driver's sub-build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubBuildOutcome {
  pub driver: String,
  #[serde(flatten)]
  pub status: SubBuildStatus,
  pub duration_ms: u64,
}

/// Result of dispatching all module sub-builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
  pub action: Action,
  pub plan: Option<WorkerPlan>,
  /// One outcome per module driver, in module order.
  pub outcomes: Vec<SubBuildOutcome>,
}

impl DispatchReport {
  /// Report for a dispatch that had nothing to do.
  pub fn empty(action: Action) -> Self {
    Self {
      action,
      plan: None,
      outcomes: Vec::new(),
    }
  }

  /// Returns true if every sub-build succeeded.
  pub fn is_success(&self) -> bool {
    self.outcomes.iter().all(|o| o.status.is_success())
  }

  /// The first sub-build, in module order, that did not succeed.
  ///
  /// Real failures take precedence over cancellations they caused.
  pub fn first_failure(&self) -> Option<&SubBuildOutcome> {
    self
      .outcomes
      .iter()
      .find(|o| o.status.is_failure())
      .or_else(|| self.outcomes.iter().find(|o| !o.status.is_success()))
  }

  pub fn succeeded(&self) -> usize {
    self.outcomes.iter().filter(|o| o.status.is_success()).count()
  }

  pub fn failed(&self) -> usize {
    self.outcomes.iter().filter(|o| o.status.is_failure()).count()
  }

  pub fn cancelled(&self) -> usize {
    self
      .outcomes
      .iter()
      .filter(|o| o.status == SubBuildStatus::Cancelled)
      .count()
  }
}
