//! The group suspend/resume primitive as seen by the harness.
//!
//! The harness only relies on one property: after `suspend_group`, any
//! process calling `checkpoint` blocks until a later `resume_group`.
//! [`LockGate`] provides that property with an advisory `flock` so the
//! harness can be exercised on hosts that do not ship the real primitive.

use crate::error::GroupError;
use nix::errno::Errno;
use std::ffi::CString;
use std::fs::File;
use std::fs::OpenOptions;
use std::os::fd::AsRawFd;
use std::os::fd::RawFd;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tempfile::TempDir;

/// Control entry points of a group suspend/resume primitive.
///
/// `checkpoint` is called from forked worker processes and must not
/// allocate or take locks that another thread of the orchestrator could
/// have held at fork time.
pub trait GroupControl {
    fn suspend_group(&self) -> Result<(), GroupError>;

    fn resume_group(&self) -> Result<(), GroupError>;

    fn checkpoint(&self) -> Result<(), GroupError>;
}

/// Reference primitive backed by `flock` on a private gate file.
///
/// The orchestrator holds an exclusive lock on its own open file
/// description while the group is suspended. A checkpoint opens a fresh
/// description and takes a shared lock, which blocks until the exclusive
/// one is released. Releasing wakes every blocked checkpoint at once.
pub struct LockGate {
    dir: TempDir,
    path: CString,
    holder: File,
}

impl LockGate {
    pub fn new() -> Result<Self, GroupError> {
        let dir = tempfile::Builder::new()
            .prefix("group-gate")
            .tempdir()
            .map_err(GroupError::Create)?;
        let gate_path = dir.path().join("gate");
        let holder = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&gate_path)
            .map_err(GroupError::Create)?;
        let path =
            CString::new(gate_path.as_os_str().as_bytes()).map_err(|_| GroupError::InvalidPath)?;

        tracing::debug!(path = %gate_path.display(), "created group gate");
        Ok(Self { dir, path, holder })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

impl GroupControl for LockGate {
    fn suspend_group(&self) -> Result<(), GroupError> {
        flock(self.holder.as_raw_fd(), libc::LOCK_EX).map_err(GroupError::Suspend)
    }

    fn resume_group(&self) -> Result<(), GroupError> {
        flock(self.holder.as_raw_fd(), libc::LOCK_UN).map_err(GroupError::Resume)
    }

    fn checkpoint(&self) -> Result<(), GroupError> {
        // SAFETY: `path` is a valid nul-terminated string owned by `self`.
        let fd = unsafe { libc::open(self.path.as_ptr(), libc::O_RDONLY | libc::O_CLOEXEC) };
        if fd < 0 {
            return Err(GroupError::Checkpoint(Errno::last()));
        }
        let result = flock(fd, libc::LOCK_SH).and_then(|()| flock(fd, libc::LOCK_UN));
        // SAFETY: `fd` was opened above and is not used after this call.
        unsafe { libc::close(fd) };
        result.map_err(GroupError::Checkpoint)
    }
}

fn flock(fd: RawFd, operation: libc::c_int) -> Result<(), Errno> {
    loop {
        // SAFETY: `fd` refers to a file that stays open for the duration of
        // this call and `operation` is a valid `flock` operation.
        let rc = unsafe { libc::flock(fd, operation) };
        if rc == 0 {
            return Ok(());
        }
        match Errno::last() {
            Errno::EINTR => continue,
            errno => return Err(errno),
        }
    }
}
