//! The watchdog process that bounds the length of a run.

use crate::error::HarnessError;
use crate::process::ProcessOps;
use crate::spawner::ProcessTable;
use nix::sys::signal;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use std::time::Duration;

/// Signal the watchdog sends to every worker once the deadline passes.
pub const WATCHDOG_SIGNAL: Signal = Signal::SIGTERM;

/// Spawns the watchdog for `table`.
///
/// The watchdog sleeps for `deadline` and then signals every recorded
/// worker, whether or not it is still alive. Signaling a worker that has
/// already exited is not treated as an error.
pub fn spawn_watchdog(
    table: &ProcessTable,
    deadline: Duration,
    ops: &mut dyn ProcessOps,
) -> Result<Pid, HarnessError> {
    let workers = table.pids();
    let mut body = || {
        std::thread::sleep(deadline);
        for &worker in workers {
            let _ = signal::kill(worker, WATCHDOG_SIGNAL);
        }
        0
    };
    let pid = ops.spawn(&mut body).map_err(HarnessError::SpawnWatchdog)?;
    tracing::debug!(pid = %pid, deadline_ms = deadline.as_millis() as u64, "armed watchdog");
    Ok(pid)
}
