use nix::errno::Errno;
use nix::unistd::Pid;
use thiserror::Error;

/// Failures reported by a group suspend/resume primitive.
#[derive(Debug, Error)]
pub enum GroupError {
    #[error("failed to create gate file: {0}")]
    Create(#[source] std::io::Error),

    #[error("gate path contains a null byte")]
    InvalidPath,

    #[error("failed to suspend group: {0}")]
    Suspend(#[source] Errno),

    #[error("failed to resume group: {0}")]
    Resume(#[source] Errno),

    #[error("checkpoint failed: {0}")]
    Checkpoint(#[source] Errno),
}

/// Fatal harness errors. Any of these aborts the run immediately.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Creating the process for the worker at `index` failed.
    #[error("failed to spawn worker {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: Errno,
    },

    #[error("failed to spawn watchdog: {0}")]
    SpawnWatchdog(#[source] Errno),

    /// An inline entry's primitive call failed in the orchestrator.
    #[error("inline entry at position {position} failed: {source}")]
    InlineStep {
        position: usize,
        #[source]
        source: GroupError,
    },

    #[error("wait for child failed after {collected} of {expected} completions: {source}")]
    Wait {
        collected: usize,
        expected: usize,
        #[source]
        source: Errno,
    },

    /// The wait call reported a process that is neither a worker nor the
    /// watchdog.
    #[error("wait reported untracked child {0}")]
    UntrackedChild(Pid),

    #[error("child {pid} (worker {index}) reported completion twice")]
    DuplicateCompletion { pid: Pid, index: usize },

    #[error("watchdog {0} reported exit twice")]
    DuplicateWatchdog(Pid),

    #[error("failed to dispose of child {pid}: {source}")]
    Dispose {
        pid: Pid,
        #[source]
        source: Errno,
    },

    #[error(transparent)]
    Group(#[from] GroupError),
}

/// Outcome of a failed scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("scenario `{scenario}` aborted: {source}")]
    Harness {
        scenario: String,
        #[source]
        source: HarnessError,
    },

    #[error("scenario `{scenario}` expected order {expected:?}, got {actual:?}")]
    OrderMismatch {
        scenario: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}
