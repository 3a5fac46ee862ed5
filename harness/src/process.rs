//! OS process plumbing: create, wait for any child, dispose.

use nix::errno::Errno;
use nix::libc;
use nix::sys::signal;
use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use nix::sys::wait::wait;
use nix::sys::wait::waitpid;
use nix::unistd::ForkResult;
use nix::unistd::Pid;
use nix::unistd::fork;
use serde::Serialize;
use serde::Serializer;
use std::panic;
use std::panic::AssertUnwindSafe;

/// Exit status used when a child body panics.
pub const CHILD_PANIC_STATUS: i32 = 101;

/// How a child process finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    Exited(i32),
    Signaled(Signal),
}

impl ChildStatus {
    pub const fn success(self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl Serialize for ChildStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ChildStatus::Exited(code) => serializer.serialize_str(&format!("exited({code})")),
            ChildStatus::Signaled(sig) => serializer.serialize_str(&format!("signaled({sig})")),
        }
    }
}

/// The process operations the harness needs from the OS.
pub trait ProcessOps {
    /// Creates a child process that runs `body` and exits with its return
    /// value. Returns the child's pid in the parent.
    fn spawn(&mut self, body: &mut dyn FnMut() -> i32) -> Result<Pid, Errno>;

    /// Blocks until any child terminates and returns its pid and status.
    fn wait_any(&mut self) -> Result<(Pid, ChildStatus), Errno>;

    /// Kills `pid` and reaps it with a targeted wait. A child that already
    /// exited or was already reaped is not an error.
    fn dispose(&mut self, pid: Pid) -> Result<(), Errno>;
}

/// [`ProcessOps`] on top of `fork(2)`, `wait(2)` and `kill(2)`.
#[derive(Debug, Default)]
pub struct ForkProcessOps;

impl ProcessOps for ForkProcessOps {
    fn spawn(&mut self, body: &mut dyn FnMut() -> i32) -> Result<Pid, Errno> {
        // SAFETY: the child only runs `body`, which is restricted to
        // allocation-free work, and then leaves through `_exit`.
        match unsafe { fork() }? {
            ForkResult::Child => {
                let code =
                    panic::catch_unwind(AssertUnwindSafe(body)).unwrap_or(CHILD_PANIC_STATUS);
                // SAFETY: `_exit` skips atexit handlers and stdio flushing
                // inherited from the parent, and never returns.
                unsafe { libc::_exit(code) }
            }
            ForkResult::Parent { child } => Ok(child),
        }
    }

    fn wait_any(&mut self) -> Result<(Pid, ChildStatus), Errno> {
        loop {
            match wait() {
                Ok(WaitStatus::Exited(pid, code)) => return Ok((pid, ChildStatus::Exited(code))),
                Ok(WaitStatus::Signaled(pid, sig, _)) => {
                    return Ok((pid, ChildStatus::Signaled(sig)));
                }
                // Stops and continues are not completions.
                Ok(_) | Err(Errno::EINTR) => continue,
                Err(errno) => return Err(errno),
            }
        }
    }

    fn dispose(&mut self, pid: Pid) -> Result<(), Errno> {
        match signal::kill(pid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(errno) => return Err(errno),
        }
        loop {
            match waitpid(pid, None) {
                Ok(WaitStatus::Exited(..) | WaitStatus::Signaled(..)) | Err(Errno::ECHILD) => {
                    return Ok(());
                }
                Ok(_) | Err(Errno::EINTR) => continue,
                Err(errno) => return Err(errno),
            }
        }
    }
}
