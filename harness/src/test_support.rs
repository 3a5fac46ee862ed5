//! Scripted fakes for the process and group seams.

use crate::error::GroupError;
use crate::group::GroupControl;
use crate::process::ChildStatus;
use crate::process::ProcessOps;
use nix::errno::Errno;
use nix::unistd::Pid;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Shared, ordered record of calls made through the fakes.
pub(crate) type EventLog = Rc<RefCell<Vec<String>>>;

pub(crate) const FIRST_FAKE_PID: i32 = 1000;

pub(crate) fn pid(raw: i32) -> Pid {
    Pid::from_raw(raw)
}

#[derive(Default)]
pub(crate) struct RecordingGroup {
    log: EventLog,
    fail_checkpoint: bool,
}

impl RecordingGroup {
    pub(crate) fn with_log(log: EventLog) -> Self {
        Self {
            log,
            fail_checkpoint: false,
        }
    }

    pub(crate) fn failing_checkpoint() -> Self {
        Self {
            fail_checkpoint: true,
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    fn record(&self, call: &str) {
        self.log.borrow_mut().push(call.to_string());
    }
}

impl GroupControl for RecordingGroup {
    fn suspend_group(&self) -> Result<(), GroupError> {
        self.record("suspend");
        Ok(())
    }

    fn resume_group(&self) -> Result<(), GroupError> {
        self.record("resume");
        Ok(())
    }

    fn checkpoint(&self) -> Result<(), GroupError> {
        self.record("checkpoint");
        if self.fail_checkpoint {
            return Err(GroupError::Checkpoint(Errno::EIO));
        }
        Ok(())
    }
}

/// Hands out sequential pids without forking and replays scripted exits.
pub(crate) struct FakeProcessOps {
    log: EventLog,
    next_pid: i32,
    spawn_calls: usize,
    fail_spawn_at: Option<usize>,
    exits: VecDeque<(Pid, ChildStatus)>,
    pub(crate) wait_calls: usize,
    pub(crate) disposed: Vec<Pid>,
}

impl FakeProcessOps {
    pub(crate) fn new() -> Self {
        Self {
            log: EventLog::default(),
            next_pid: FIRST_FAKE_PID,
            spawn_calls: 0,
            fail_spawn_at: None,
            exits: VecDeque::new(),
            wait_calls: 0,
            disposed: Vec::new(),
        }
    }

    pub(crate) fn with_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    /// Makes the `call`-th spawn (zero based) fail with `EAGAIN`.
    pub(crate) fn failing_spawn_at(mut self, call: usize) -> Self {
        self.fail_spawn_at = Some(call);
        self
    }

    /// Queues clean exits for the given raw pids, in order.
    pub(crate) fn with_exits(mut self, raw_pids: &[i32]) -> Self {
        self.exits
            .extend(raw_pids.iter().map(|raw| (pid(*raw), ChildStatus::Exited(0))));
        self
    }

    pub(crate) fn with_exit_status(mut self, raw_pid: i32, status: ChildStatus) -> Self {
        self.exits.push_back((pid(raw_pid), status));
        self
    }
}

impl ProcessOps for FakeProcessOps {
    fn spawn(&mut self, _body: &mut dyn FnMut() -> i32) -> Result<Pid, Errno> {
        let call = self.spawn_calls;
        self.spawn_calls += 1;
        if self.fail_spawn_at == Some(call) {
            return Err(Errno::EAGAIN);
        }
        let child = pid(self.next_pid);
        self.next_pid += 1;
        self.log.borrow_mut().push(format!("spawn {child}"));
        Ok(child)
    }

    fn wait_any(&mut self) -> Result<(Pid, ChildStatus), Errno> {
        self.wait_calls += 1;
        self.exits.pop_front().ok_or(Errno::ECHILD)
    }

    fn dispose(&mut self, pid: Pid) -> Result<(), Errno> {
        self.disposed.push(pid);
        Ok(())
    }
}
