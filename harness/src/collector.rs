//! Drains child exit notifications into a completion order.

use crate::error::HarnessError;
use crate::process::ChildStatus;
use crate::process::ProcessOps;
use crate::spawner::ProcessTable;
use nix::unistd::Pid;
use serde::Serialize;
use std::collections::HashMap;

/// One worker's completion, in the order it was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub index: usize,
    #[serde(serialize_with = "serialize_pid")]
    pub pid: Pid,
    pub status: ChildStatus,
}

/// The collected completions of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompletionOrder {
    pub completions: Vec<Completion>,
    /// Whether the watchdog exit was observed before the last worker.
    pub watchdog_reported: bool,
}

impl CompletionOrder {
    /// Worker indices in completion order.
    pub fn indices(&self) -> Vec<usize> {
        self.completions.iter().map(|c| c.index).collect()
    }

    /// Workers that did not exit cleanly, e.g. ones the watchdog killed.
    pub fn failures(&self) -> impl Iterator<Item = &Completion> {
        self.completions.iter().filter(|c| !c.status.success())
    }
}

/// Maps exiting children back to their worker index.
///
/// The pid lookup lives only as long as the collector, i.e. one run.
pub struct CompletionCollector {
    pending: HashMap<Pid, usize>,
    consumed: HashMap<Pid, usize>,
    watchdog: Pid,
    expected: usize,
}

impl CompletionCollector {
    pub fn new(table: &ProcessTable, watchdog: Pid) -> Self {
        let pending = table
            .pids()
            .iter()
            .enumerate()
            .map(|(index, pid)| (*pid, index))
            .collect();
        Self {
            pending,
            consumed: HashMap::with_capacity(table.len()),
            watchdog,
            expected: table.len(),
        }
    }

    /// Waits until every worker has reported.
    ///
    /// The watchdog's exit is skipped and never counted. If the watchdog is
    /// still running once the last worker reports, it is left alone; the
    /// caller decides what to do with it.
    pub fn collect(mut self, ops: &mut dyn ProcessOps) -> Result<CompletionOrder, HarnessError> {
        let mut order = CompletionOrder {
            completions: Vec::with_capacity(self.expected),
            watchdog_reported: false,
        };

        while order.completions.len() < self.expected {
            let (pid, status) = ops.wait_any().map_err(|source| HarnessError::Wait {
                collected: order.completions.len(),
                expected: self.expected,
                source,
            })?;

            if pid == self.watchdog {
                if order.watchdog_reported {
                    return Err(HarnessError::DuplicateWatchdog(pid));
                }
                order.watchdog_reported = true;
                tracing::debug!(pid = %pid, "watchdog exited");
                continue;
            }

            let index = self.resolve(pid)?;
            tracing::debug!(index, pid = %pid, ?status, "worker completed");
            order.completions.push(Completion { index, pid, status });
        }

        Ok(order)
    }

    fn resolve(&mut self, pid: Pid) -> Result<usize, HarnessError> {
        if let Some(index) = self.pending.remove(&pid) {
            self.consumed.insert(pid, index);
            return Ok(index);
        }
        match self.consumed.get(&pid) {
            Some(&index) => Err(HarnessError::DuplicateCompletion { pid, index }),
            None => Err(HarnessError::UntrackedChild(pid)),
        }
    }
}

fn serialize_pid<S: serde::Serializer>(pid: &Pid, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i32(pid.as_raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GroupControl;
    use crate::script::TaskEntry;
    use crate::script::just_sleep;
    use crate::spawner::ProcessSpawner;
    use crate::test_support::FakeProcessOps;
    use crate::test_support::RecordingGroup;
    use nix::sys::signal::Signal;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const WATCHDOG: i32 = 999;

    fn table_of(workers: usize) -> ProcessTable {
        let group = RecordingGroup::default();
        let group: &dyn GroupControl = &group;
        let entries = vec![TaskEntry::Spawned(just_sleep(0)); workers];
        ProcessSpawner::new(group, Duration::ZERO)
            .spawn_all(&entries, &mut FakeProcessOps::new())
            .unwrap()
    }

    fn collect(workers: usize, ops: &mut FakeProcessOps) -> Result<CompletionOrder, HarnessError> {
        CompletionCollector::new(&table_of(workers), Pid::from_raw(WATCHDOG)).collect(ops)
    }

    #[test]
    fn resolves_pids_to_indices_in_exit_order() {
        let mut ops = FakeProcessOps::new().with_exits(&[1001, 1002, 1000]);

        let order = collect(3, &mut ops).unwrap();

        assert_eq!(order.indices(), vec![1, 2, 0]);
        assert!(!order.watchdog_reported);
        assert_eq!(ops.wait_calls, 3);
    }

    #[test]
    fn watchdog_exit_is_discarded() {
        let mut ops = FakeProcessOps::new().with_exits(&[1000, WATCHDOG, 1001]);

        let order = collect(2, &mut ops).unwrap();

        assert_eq!(order.indices(), vec![0, 1]);
        assert!(order.watchdog_reported);
        assert_eq!(ops.wait_calls, 3);
    }

    #[test]
    fn stops_once_all_workers_reported() {
        // The watchdog exit queued last must never be consumed.
        let mut ops = FakeProcessOps::new().with_exits(&[1000, 1001, WATCHDOG]);

        let order = collect(2, &mut ops).unwrap();

        assert_eq!(order.indices(), vec![0, 1]);
        assert!(!order.watchdog_reported);
        assert_eq!(ops.wait_calls, 2);
    }

    #[test]
    fn no_workers_means_no_wait() {
        let mut ops = FakeProcessOps::new().with_exits(&[WATCHDOG]);

        let order = collect(0, &mut ops).unwrap();

        assert!(order.completions.is_empty());
        assert_eq!(ops.wait_calls, 0);
    }

    #[test]
    fn duplicate_report_is_fatal() {
        let mut ops = FakeProcessOps::new().with_exits(&[1000, 1000, 1001]);

        let err = collect(2, &mut ops).unwrap_err();

        assert!(matches!(err, HarnessError::DuplicateCompletion { index: 0, .. }));
        assert_eq!(ops.wait_calls, 2);
    }

    #[test]
    fn duplicate_watchdog_report_is_fatal() {
        let mut ops = FakeProcessOps::new().with_exits(&[WATCHDOG, WATCHDOG, 1000]);

        let err = collect(1, &mut ops).unwrap_err();

        assert!(matches!(err, HarnessError::DuplicateWatchdog(_)));
    }

    #[test]
    fn foreign_child_is_fatal() {
        let mut ops = FakeProcessOps::new().with_exits(&[1000, 4242]);

        let err = collect(2, &mut ops).unwrap_err();

        assert!(matches!(err, HarnessError::UntrackedChild(pid) if pid.as_raw() == 4242));
    }

    #[test]
    fn running_out_of_children_is_fatal() {
        let mut ops = FakeProcessOps::new().with_exits(&[1000]);

        let err = collect(2, &mut ops).unwrap_err();

        assert!(matches!(err, HarnessError::Wait { collected: 1, expected: 2, .. }));
    }

    #[test]
    fn killed_worker_still_counts_as_completion() {
        let mut ops = FakeProcessOps::new()
            .with_exits(&[1001])
            .with_exit_status(1000, ChildStatus::Signaled(Signal::SIGTERM));

        let order = collect(2, &mut ops).unwrap();

        assert_eq!(order.indices(), vec![1, 0]);
        let failed: Vec<usize> = order.failures().map(|c| c.index).collect();
        assert_eq!(failed, vec![0]);
    }
}
