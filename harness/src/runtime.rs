//! One complete harness run: spawn, arm the watchdog, collect.

use crate::collector::Completion;
use crate::collector::CompletionCollector;
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::group::GroupControl;
use crate::group::LockGate;
use crate::process::ForkProcessOps;
use crate::process::ProcessOps;
use crate::script::TaskEntry;
use crate::spawner::ProcessSpawner;
use crate::spawner::ProcessTable;
use crate::watchdog::spawn_watchdog;
use nix::unistd::Pid;
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

/// Result of a single run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Worker indices in the order the workers completed.
    pub order: Vec<usize>,
    pub completions: Vec<Completion>,
    pub watchdog_reported: bool,
    pub elapsed_ms: u64,
}

/// Drives task entries through the spawner, watchdog and collector.
pub struct Harness<P, G> {
    config: HarnessConfig,
    ops: P,
    group: G,
}

impl Harness<ForkProcessOps, LockGate> {
    /// A harness that forks real workers and uses a fresh [`LockGate`].
    pub fn with_lock_gate(config: HarnessConfig) -> Result<Self, HarnessError> {
        Ok(Self::new(config, ForkProcessOps, LockGate::new()?))
    }
}

impl<P: ProcessOps, G: GroupControl> Harness<P, G> {
    pub fn new(config: HarnessConfig, ops: P, group: G) -> Self {
        Self { config, ops, group }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn group(&self) -> &G {
        &self.group
    }

    pub fn ops(&self) -> &P {
        &self.ops
    }

    /// Runs `entries` once and returns the observed completion order.
    ///
    /// Any error is fatal for the run. Children still owned by the run are
    /// disposed of before the error is returned.
    pub fn run(&mut self, entries: &[TaskEntry]) -> Result<RunReport, HarnessError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id, entries = entries.len());
        let _guard = span.enter();
        let started = Instant::now();

        let table = ProcessSpawner::new(&self.group, self.config.quantum())
            .spawn_all(entries, &mut self.ops)?;

        let watchdog = match spawn_watchdog(&table, self.config.deadline(), &mut self.ops) {
            Ok(pid) => pid,
            Err(err) => {
                self.dispose_all(&table, None);
                return Err(err);
            }
        };

        let order = match CompletionCollector::new(&table, watchdog).collect(&mut self.ops) {
            Ok(order) => order,
            Err(err) => {
                self.dispose_all(&table, Some(watchdog));
                return Err(err);
            }
        };

        if !order.watchdog_reported {
            // Reap it here so a later run never sees it as a foreign child.
            self.ops.dispose(watchdog).map_err(|source| HarnessError::Dispose {
                pid: watchdog,
                source,
            })?;
        }

        for failed in order.failures() {
            tracing::warn!(
                index = failed.index,
                pid = %failed.pid,
                status = ?failed.status,
                "worker did not exit cleanly"
            );
        }

        let indices = order.indices();
        tracing::info!(order = ?indices, "Order: {indices:?}");

        Ok(RunReport {
            run_id,
            order: indices,
            completions: order.completions,
            watchdog_reported: order.watchdog_reported,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn dispose_all(&mut self, table: &ProcessTable, watchdog: Option<Pid>) {
        let pids = watchdog.into_iter().chain(table.pids().iter().copied());
        for pid in pids {
            if let Err(errno) = self.ops.dispose(pid) {
                tracing::warn!(pid = %pid, %errno, "failed to dispose of child after fatal error");
            }
        }
    }
}
