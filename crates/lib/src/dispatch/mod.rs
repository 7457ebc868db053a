//! Module sub-build dispatch.
//!
//! Every driver resolved to module state is built by its own build tool
//! invocation. Drivers have no declared dependencies on each other, so the
//! invocations run concurrently in a bounded worker pool:
//! - at most `min(parallelism, drivers)` sub-builds run at once
//! - each gets an equal share of the processing units as its `-j` hint
//! - every exit status is collected, and failures never go unreported
//! - a shared cancellation signal stops queued and running sub-builds

pub mod cancel;
pub(crate) mod subbuild;
pub mod types;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::action::Action;

pub use cancel::CancelSignal;
pub use types::{
  BuildTool, DispatchConfig, DispatchReport, MAKE_ENV, SubBuildOutcome, SubBuildStatus, WorkerPlan, num_cpus,
};

/// Run the sub-build of every driver in `modules` with `action`.
///
/// Returns one outcome per driver, in `modules` order. An empty `modules`
/// list starts nothing.
///
/// A failed sub-build does not stop the others unless `config.fail_fast` is
/// set, in which case it fires `cancel`. Once `cancel` fires, queued
/// sub-builds are skipped and running ones are terminated; this function
/// only returns after all of them have exited.
pub async fn dispatch(
  driver_root: &Path,
  modules: &[String],
  action: Action,
  config: &DispatchConfig,
  cancel: &CancelSignal,
) -> DispatchReport {
  if modules.is_empty() {
    info!("no module drivers selected");
    return DispatchReport::empty(action);
  }

  let plan = WorkerPlan::new(config.parallelism, modules.len());
  info!(
    modules = modules.len(),
    workers = plan.workers,
    jobs_per_build = plan.jobs_per_build,
    action = %action,
    "dispatching module sub-builds"
  );

  let semaphore = Arc::new(Semaphore::new(plan.workers));
  let mut join_set = JoinSet::new();

  for (index, driver) in modules.iter().enumerate() {
    let driver = driver.clone();
    let driver_dir = driver_root.join(&driver);
    let tool = config.tool.clone();
    let fail_fast = config.fail_fast;
    let semaphore = semaphore.clone();
    let cancel = cancel.clone();

    join_set.spawn(async move {
      let started = Instant::now();

      let status = tokio::select! {
        biased;
        _ = cancel.cancelled() => SubBuildStatus::Cancelled,
        permit = semaphore.acquire_owned() => match permit {
          Ok(_permit) if !cancel.is_cancelled() => {
            let status = subbuild::run_sub_build(
              &tool,
              &driver,
              &driver_dir,
              plan.jobs_per_build,
              action.make_target(),
              &cancel,
            )
            .await;
            // Cancel while still holding the permit so no queued build slips in.
            if fail_fast && status.is_failure() {
              cancel.cancel();
            }
            status
          }
          _ => SubBuildStatus::Cancelled,
        },
      };

      match &status {
        SubBuildStatus::Succeeded => info!(driver = %driver, "sub-build succeeded"),
        SubBuildStatus::Cancelled => warn!(driver = %driver, "sub-build cancelled"),
        failed => error!(driver = %driver, status = %failed, "sub-build failed"),
      }

      let outcome = SubBuildOutcome {
        driver,
        status,
        duration_ms: started.elapsed().as_millis() as u64,
      };
      (index, outcome)
    });
  }

  let outcomes = collect_outcomes(join_set, modules).await;
  let report = DispatchReport {
    action,
    plan: Some(plan),
    outcomes,
  };

  info!(
    succeeded = report.succeeded(),
    failed = report.failed(),
    cancelled = report.cancelled(),
    "module dispatch complete"
  );

  report
}

/// Collect task results back into `modules` order.
async fn collect_outcomes(mut join_set: JoinSet<(usize, SubBuildOutcome)>, modules: &[String]) -> Vec<SubBuildOutcome> {
  let mut slots: Vec<Option<SubBuildOutcome>> = vec![None; modules.len()];

  while let Some(join_result) = join_set.join_next().await {
    match join_result {
      Ok((index, outcome)) => slots[index] = Some(outcome),
      Err(e) => error!(error = %e, "sub-build task panicked"),
    }
  }

  slots
    .into_iter()
    .zip(modules)
    .map(|(slot, driver)| {
      slot.unwrap_or_else(|| SubBuildOutcome {
        driver: driver.clone(),
        status: SubBuildStatus::SpawnFailed {
          message: "sub-build task terminated unexpectedly".to_string(),
        },
        duration_ms: 0,
      })
    })
    .collect()
}
