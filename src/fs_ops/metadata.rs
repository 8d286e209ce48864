//! Structural replication.
//! Creates (if absent) a directory, symlink, device or special node at the
//! destination and copies attributes from the source:
//! - ownership (only when running as root; otherwise chown would always fail)
//! - permission bits (not for symlinks)
//! - atime/mtime (symlinks via lutimes)
//! - extended attributes when the `xattrs` feature is enabled (best-effort)
//!
//! An existing destination of a different type, a symlink with a different
//! target, or a node with a different device number is never replaced:
//! those surface as `io::ErrorKind::AlreadyExists`.

use filetime::{FileTime, set_file_times, set_symlink_file_times};
use std::ffi::CString;
use std::fs::{self, Metadata};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{MetadataExt, PermissionsExt, lchown, symlink};
use std::path::Path;
use tracing::trace;

fn occupied(dst: &Path, what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("'{}' is occupied by {}", dst.display(), what),
    )
}

fn ensure_dir(dst: &Path) -> io::Result<()> {
    match fs::symlink_metadata(dst) {
        Ok(m) if m.is_dir() => Ok(()),
        Ok(_) => Err(occupied(dst, "a non-directory")),
        Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir(dst),
        Err(e) => Err(e),
    }
}

fn ensure_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    let target = fs::read_link(src)?;
    match fs::symlink_metadata(dst) {
        Ok(m) if m.file_type().is_symlink() => {
            if fs::read_link(dst)? == target {
                Ok(())
            } else {
                Err(occupied(dst, "a symlink with a different target"))
            }
        }
        Ok(_) => Err(occupied(dst, "a non-symlink")),
        Err(e) if e.kind() == io::ErrorKind::NotFound => symlink(&target, dst),
        Err(e) => Err(e),
    }
}

fn ensure_node(dst: &Path, src_meta: &Metadata) -> io::Result<()> {
    const S_IFMT: u32 = libc::S_IFMT as u32;
    match fs::symlink_metadata(dst) {
        Ok(m) if m.mode() & S_IFMT == src_meta.mode() & S_IFMT && m.rdev() == src_meta.rdev() => Ok(()),
        Ok(_) => Err(occupied(dst, "a different node")),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let c = CString::new(dst.as_os_str().as_bytes())
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains null byte"))?;
            let rc = unsafe {
                libc::mknod(c.as_ptr(), src_meta.mode() as libc::mode_t, src_meta.rdev() as libc::dev_t)
            };
            if rc != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Copy ownership, permissions and times from `src_meta` onto `dst` (not following symlinks).
pub fn apply_attributes(dst: &Path, src_meta: &Metadata) -> io::Result<()> {
    let is_link = src_meta.file_type().is_symlink();

    // chown before chmod: chown may clear setuid/setgid bits.
    if is_root() {
        lchown(dst, Some(src_meta.uid()), Some(src_meta.gid()))?;
    }
    if !is_link {
        let mode = src_meta.mode() & 0o7777;
        fs::set_permissions(dst, fs::Permissions::from_mode(mode))?;
        trace!(path = %dst.display(), mode = format!("{:o}", mode), "set permissions");
    }

    let at = FileTime::from_unix_time(src_meta.atime(), src_meta.atime_nsec() as u32);
    let mt = FileTime::from_unix_time(src_meta.mtime(), src_meta.mtime_nsec() as u32);
    if is_link {
        set_symlink_file_times(dst, at, mt)?;
    } else {
        set_file_times(dst, at, mt)?;
    }
    Ok(())
}

/// Replicate a non-regular-file entry from `src` to `dst`.
pub fn replicate_entry(src: &Path, dst: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(src)?;
    let ft = meta.file_type();
    if ft.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "regular files are moved, not replicated",
        ));
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }

    if ft.is_dir() {
        ensure_dir(dst)?;
    } else if ft.is_symlink() {
        ensure_symlink(src, dst)?;
    } else {
        ensure_node(dst, &meta)?;
    }

    apply_attributes(dst, &meta)?;
    if !ft.is_symlink() {
        preserve_xattrs(src, dst);
    }
    Ok(())
}

/// Copy extended attributes from `src` to `dst` (requires the `xattrs` feature).
/// Best-effort: failures are logged and ignored.
pub fn preserve_xattrs(src: &Path, dst: &Path) {
    #[cfg(feature = "xattrs")]
    {
        use tracing::warn;
        match xattr::list(src) {
            Ok(names) => {
                for name in names {
                    let name_disp = name.to_string_lossy().into_owned();
                    match xattr::get(src, &name) {
                        Ok(value) => {
                            let value = value.unwrap_or_default();
                            if let Err(e) = xattr::set(dst, &name, &value) {
                                warn!(src = %src.display(), dest = %dst.display(), xattr = %name_disp, error = %e, "failed to set xattr on destination");
                            } else {
                                trace!(dest = %dst.display(), xattr = %name_disp, size = value.len(), "preserved xattr");
                            }
                        }
                        Err(e) => {
                            warn!(src = %src.display(), xattr = %name_disp, error = %e, "failed to read xattr value from source");
                        }
                    }
                }
            }
            Err(e) => {
                warn!(src = %src.display(), error = %e, "failed to list xattrs; continuing");
            }
        }
    }
    #[cfg(not(feature = "xattrs"))]
    {
        let _ = (src, dst);
    }
}
