//! Turns a list of task entries into inline calls and worker processes.

use crate::error::HarnessError;
use crate::group::GroupControl;
use crate::process::ProcessOps;
use crate::script::TaskEntry;
use crate::script::TaskScript;
use crate::script::run_script;
use crate::script::spawned_count;
use nix::unistd::Pid;
use std::time::Duration;

/// Exit status of a worker whose script finished.
pub const WORKER_OK_STATUS: i32 = 0;

/// Exit status of a worker whose primitive call failed.
pub const WORKER_GROUP_ERROR_STATUS: i32 = 1;

/// Worker pids, index-aligned with the spawned entries of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessTable {
    pids: Vec<Pid>,
}

impl ProcessTable {
    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    pub fn pids(&self) -> &[Pid] {
        &self.pids
    }
}

/// Realizes task entries in declaration order.
pub struct ProcessSpawner<'a> {
    group: &'a dyn GroupControl,
    quantum: Duration,
}

impl<'a> ProcessSpawner<'a> {
    pub fn new(group: &'a dyn GroupControl, quantum: Duration) -> Self {
        Self { group, quantum }
    }

    /// Runs inline entries in place and forks one worker per spawned entry.
    ///
    /// On failure every worker spawned so far is disposed of before the
    /// error is returned, and no wait for an arbitrary child is issued.
    pub fn spawn_all(
        &self,
        entries: &[TaskEntry],
        ops: &mut dyn ProcessOps,
    ) -> Result<ProcessTable, HarnessError> {
        let mut table = ProcessTable {
            pids: Vec::with_capacity(spawned_count(entries)),
        };

        for (position, entry) in entries.iter().enumerate() {
            let step = match entry {
                TaskEntry::Inline(script) => self.run_inline(position, script),
                TaskEntry::Spawned(script) => {
                    self.spawn_worker(table.len(), script, ops)
                        .map(|pid| table.pids.push(pid))
                }
            };
            if let Err(err) = step {
                abandon(&table, ops);
                return Err(err);
            }
        }

        Ok(table)
    }

    fn run_inline(&self, position: usize, script: &TaskScript) -> Result<(), HarnessError> {
        run_script(script, self.group, self.quantum)
            .map_err(|source| HarnessError::InlineStep { position, source })?;
        tracing::debug!(position, "ran inline entry");
        Ok(())
    }

    fn spawn_worker(
        &self,
        index: usize,
        script: &TaskScript,
        ops: &mut dyn ProcessOps,
    ) -> Result<Pid, HarnessError> {
        let group = self.group;
        let quantum = self.quantum;
        let mut body = || match run_script(script, group, quantum) {
            Ok(()) => WORKER_OK_STATUS,
            Err(_) => WORKER_GROUP_ERROR_STATUS,
        };
        let pid = ops
            .spawn(&mut body)
            .map_err(|source| HarnessError::Spawn { index, source })?;
        tracing::debug!(index, pid = %pid, "spawned worker");
        Ok(pid)
    }
}

fn abandon(table: &ProcessTable, ops: &mut dyn ProcessOps) {
    for &pid in table.pids() {
        if let Err(errno) = ops.dispose(pid) {
            tracing::warn!(pid = %pid, %errno, "failed to dispose of worker after aborted setup");
        }
    }
}
