//! A single module driver's sub-build.
//!
//! Runs the build tool against the driver directory and observes its exit
//! status. The tool inherits stdout and stderr so its output reaches the
//! operator as it is produced.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::cancel::CancelSignal;
use super::types::{BuildTool, SubBuildStatus};

/// How long a terminated sub-build gets to exit before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Run `tool -j<jobs> -C <driver_dir> <target>` to completion or cancellation.
pub(crate) async fn run_sub_build(
  tool: &BuildTool,
  driver: &str,
  driver_dir: &Path,
  jobs: usize,
  target: &str,
  cancel: &CancelSignal,
) -> SubBuildStatus {
  let mut command = Command::new(&tool.program);
  command
    .args(&tool.args)
    .arg(format!("-j{jobs}"))
    .arg("-C")
    .arg(driver_dir)
    .arg(target)
    .stdin(Stdio::null())
    .kill_on_drop(true);

  // Own process group, so cancellation reaches everything the tool spawns.
  #[cfg(unix)]
  command.process_group(0);

  info!(driver = %driver, tool = %tool, jobs, target = %target, "starting sub-build");

  let mut child = match command.spawn() {
    Ok(child) => child,
    Err(e) => {
      warn!(driver = %driver, error = %e, "failed to start sub-build");
      return SubBuildStatus::SpawnFailed { message: e.to_string() };
    }
  };

  tokio::select! {
    status = child.wait() => match status {
      Ok(status) if status.success() => SubBuildStatus::Succeeded,
      Ok(status) => SubBuildStatus::Failed { code: status.code() },
      Err(e) => SubBuildStatus::SpawnFailed { message: e.to_string() },
    },
    _ = cancel.cancelled() => {
      terminate(&mut child, driver).await;
      SubBuildStatus::Cancelled
    }
  }
}

/// Stop a running sub-build and wait for it to exit.
async fn terminate(child: &mut Child, driver: &str) {
  debug!(driver = %driver, "terminating sub-build");

  if signal_group(child, GroupSignal::Terminate)
    && tokio::time::timeout(TERMINATE_GRACE, child.wait()).await.is_ok()
  {
    return;
  }

  signal_group(child, GroupSignal::Kill);
  if let Err(e) = child.kill().await {
    warn!(driver = %driver, error = %e, "failed to kill sub-build");
  }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
  Terminate,
  Kill,
}

/// Signal the sub-build's whole process group. Returns false if no signal
/// could be delivered.
#[cfg(unix)]
fn signal_group(child: &Child, signal: GroupSignal) -> bool {
  use rustix::process::{Pid, Signal, kill_process_group};

  let Some(pid) = child.id().and_then(|id| Pid::from_raw(id as i32)) else {
    return false;
  };
  let signal = match signal {
    GroupSignal::Terminate => Signal::TERM,
    GroupSignal::Kill => Signal::KILL,
  };

  kill_process_group(pid, signal).is_ok()
}

#[cfg(not(unix))]
fn signal_group(_child: &Child, _signal: GroupSignal) -> bool {
  false
}
