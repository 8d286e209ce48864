//! Run lock.
//! Only one migration cycle may operate on a given pair of trees at a time.
//!
//! Design:
//! - The lock is an `flock(LOCK_EX | LOCK_NB)` on a configured lock file.
//! - A held lock is not an error: the caller logs it and exits cleanly.
//! - The lock is released when the `RunLock` guard is dropped; the file stays
//!   on disk so a racing process never locks an unlinked inode.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::trace;

/// RAII guard held while the run lock is active.
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // flock also releases on close; explicit unlock is best-effort.
        let _ = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
        trace!(path = %self.path.display(), "run lock released");
    }
}

/// Non-blocking attempt to take the run lock at `lock_path`.
/// Returns Ok(None) if another process holds it.
pub fn try_acquire_run_lock(lock_path: &Path) -> io::Result<Option<RunLock>> {
    if let Some(parent) = lock_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let f = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .custom_flags(libc::O_CLOEXEC)
        .mode(0o600)
        .open(lock_path)?;

    let rc = unsafe { libc::flock(f.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        trace!(path = %lock_path.display(), "run lock acquired");
        return Ok(Some(RunLock {
            file: f,
            path: lock_path.to_path_buf(),
        }));
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        trace!(path = %lock_path.display(), "run lock held elsewhere");
        return Ok(None);
    }
    Err(err)
}
