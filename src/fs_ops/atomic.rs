//! No-overwrite rename.
//! - Linux: `renameat2(RENAME_NOREPLACE)`, atomic and never clobbers.
//! - Elsewhere (or filesystems without RENAME_NOREPLACE): hard link then unlink the
//!   source. `link(2)` fails with EEXIST instead of replacing, so the guarantee holds.
//! - Best-effort fsync of the destination directory after the rename.
//!
//! An existing destination always surfaces as `io::ErrorKind::AlreadyExists`.

use std::ffi::CString;
use std::fs::{self, File};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::trace;

fn c_path(p: &Path) -> io::Result<CString> {
    CString::new(p.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains null byte"))
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
fn rename_noreplace(src: &Path, dst: &Path) -> io::Result<()> {
    let s = c_path(src)?;
    let d = c_path(dst)?;
    let rc = unsafe {
        libc::renameat2(
            libc::AT_FDCWD,
            s.as_ptr(),
            libc::AT_FDCWD,
            d.as_ptr(),
            libc::RENAME_NOREPLACE,
        )
    };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        // Filesystem or kernel without RENAME_NOREPLACE support.
        Some(code) if code == libc::EINVAL || code == libc::ENOSYS || code == libc::EOPNOTSUPP => {
            trace!(src = %src.display(), "renameat2 unsupported; using link+unlink");
            link_then_unlink(src, dst)
        }
        _ => Err(err),
    }
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
fn rename_noreplace(src: &Path, dst: &Path) -> io::Result<()> {
    link_then_unlink(src, dst)
}

fn link_then_unlink(src: &Path, dst: &Path) -> io::Result<()> {
    let s = c_path(src)?;
    let d = c_path(dst)?;
    // linkat without AT_SYMLINK_FOLLOW links the entry itself, not a symlink's target.
    let rc = unsafe { libc::linkat(libc::AT_FDCWD, s.as_ptr(), libc::AT_FDCWD, d.as_ptr(), 0) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    fs::remove_file(src)
}

/// Move `src` to `dst` without ever replacing an existing `dst`.
/// Missing parent directories of `dst` are created first.
pub fn move_no_clobber(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    rename_noreplace(src, dst)?;

    // fsync the destination directory to persist the rename (best-effort).
    if let Some(parent) = dst.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }
    Ok(())
}
