//! I/O helper utilities.
//!
//! Provides small adapters to enrich io::Error with actionable context/hints,
//! usable with map_err in anyhow::Result code paths, plus the same text for
//! per-item audit records.
//!
//! Usage:
//!   fs::read_dir(dir).map_err(io_error_with_help("read directory", dir))?;

use anyhow::anyhow;
use std::io;
use std::path::Path;

/// Format a human-friendly message with op/path plus errno-aware hints.
pub(crate) fn build_message(op: &str, path: &Path, e: &io::Error) -> String {
    let mut msg = format!("{} '{}': {}", op, path.display(), e);

    if let Some(code) = e.raw_os_error() {
        match code {
            libc::EACCES | libc::EPERM => {
                msg.push_str(" - permission denied; check ownership and write permissions.");
            }
            libc::EXDEV => {
                msg.push_str(" - cross-filesystem; source and destination must share a volume.");
            }
            libc::EBUSY => {
                msg.push_str(" - resource busy; ensure no other process is writing.");
            }
            libc::ENOENT => {
                msg.push_str(" - path not found; it may have been moved by another writer.");
            }
            libc::EEXIST => {
                msg.push_str(" - destination already exists; left in place for the next run.");
            }
            libc::ENOTEMPTY => {
                msg.push_str(" - directory not empty; something was written into it.");
            }
            libc::ENOSPC => {
                msg.push_str(" - insufficient space on device.");
            }
            libc::EROFS => {
                msg.push_str(" - read-only filesystem; cannot write here.");
            }
            libc::ELOOP => {
                msg.push_str(" - too many symbolic link levels; possible symlink cycle.");
            }
            libc::ENAMETOOLONG => {
                msg.push_str(" - filename or path too long; shorten path segments.");
            }
            libc::EMFILE | libc::ENFILE => {
                msg.push_str(" - file descriptor limit reached; close files or raise limits.");
            }
            _ => {}
        }
        msg.push_str(&format!(" [os code: {}]", code));
    } else {
        match e.kind() {
            io::ErrorKind::PermissionDenied => {
                msg.push_str(" - permission denied; check ownership and write permissions.");
            }
            io::ErrorKind::NotFound => {
                msg.push_str(" - path not found; verify it exists.");
            }
            io::ErrorKind::AlreadyExists => {
                msg.push_str(" - destination already exists; left in place for the next run.");
            }
            _ => {}
        }
    }

    msg
}

/// Adapter for anyhow::Result code.
/// Returns a closure suitable for `.map_err(...)` that converts io::Error -> anyhow::Error.
pub fn io_error_with_help<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> anyhow::Error + 'a {
    move |e: io::Error| anyhow!(build_message(op, path, &e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eexist_gets_hint_and_code() {
        let e = io::Error::from_raw_os_error(libc::EEXIST);
        let msg = build_message("move", Path::new("/d/x"), &e);
        assert!(msg.contains("'/d/x'"));
        assert!(msg.contains("already exists"));
        assert!(msg.contains(&format!("[os code: {}]", libc::EEXIST)));
    }

    #[test]
    fn kind_only_errors_fall_back_to_kind_hints() {
        let e = io::Error::new(io::ErrorKind::NotFound, "gone");
        let msg = build_message("stat", Path::new("/nope"), &e);
        assert!(msg.contains("path not found"));
        assert!(!msg.contains("os code"));
    }
}
