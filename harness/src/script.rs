//! Task scripts and the entries that bind them to a run order.

use crate::error::GroupError;
use crate::group::GroupControl;
use serde::Deserialize;
use serde::Serialize;
use std::time::Duration;

/// A single timed step of a task script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Sleep for the given number of quanta.
    Sleep(u32),
    /// Block until the group is not suspended.
    Checkpoint,
    /// Suspend the whole worker group.
    Stop,
    /// Resume the whole worker group.
    Start,
}

/// An ordered sequence of steps. Describes work; running it is done by
/// [`run_script`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskScript {
    steps: Vec<Step>,
}

impl TaskScript {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Total quanta spent sleeping, ignoring time blocked in checkpoints.
    pub fn sleep_quanta(&self) -> u32 {
        self.steps
            .iter()
            .map(|step| match step {
                Step::Sleep(n) => *n,
                _ => 0,
            })
            .sum()
    }
}

/// Sleep, pass a checkpoint, then sleep again.
pub fn sleep_check_suspend(pre_check: u32, post_check: u32) -> TaskScript {
    TaskScript::new(vec![
        Step::Sleep(pre_check),
        Step::Checkpoint,
        Step::Sleep(post_check),
    ])
}

pub fn just_sleep(quanta: u32) -> TaskScript {
    TaskScript::new(vec![Step::Sleep(quanta)])
}

/// Sleep, then suspend the group.
pub fn stop_group(before_stop: u32) -> TaskScript {
    TaskScript::new(vec![Step::Sleep(before_stop), Step::Stop])
}

/// Sleep, then resume the group.
pub fn restart_group(before_restart: u32) -> TaskScript {
    TaskScript::new(vec![Step::Sleep(before_restart), Step::Start])
}

/// A script bound to a position in the declared run order.
///
/// `Inline` entries run in the orchestrating process at exactly their
/// position, before anything after them is spawned. `Spawned` entries each
/// get their own process and are the only ones that show up in the
/// completion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "script", rename_all = "snake_case")]
pub enum TaskEntry {
    Inline(TaskScript),
    Spawned(TaskScript),
}

impl TaskEntry {
    pub fn script(&self) -> &TaskScript {
        match self {
            TaskEntry::Inline(script) | TaskEntry::Spawned(script) => script,
        }
    }

    pub fn is_spawned(&self) -> bool {
        matches!(self, TaskEntry::Spawned(_))
    }
}

/// Number of entries that will become worker processes.
pub fn spawned_count(entries: &[TaskEntry]) -> usize {
    entries.iter().filter(|entry| entry.is_spawned()).count()
}

/// Executes `script` in the calling process.
///
/// This runs inside forked children, so it must not allocate: it only
/// walks the pre-built step slice and calls into `group`.
pub fn run_script(
    script: &TaskScript,
    group: &dyn GroupControl,
    quantum: Duration,
) -> Result<(), GroupError> {
    for step in script.steps() {
        match *step {
            Step::Sleep(0) => {}
            Step::Sleep(n) => std::thread::sleep(quantum * n),
            Step::Checkpoint => group.checkpoint()?,
            Step::Stop => group.suspend_group()?,
            Step::Start => group.resume_group()?,
        }
    }
    Ok(())
}
