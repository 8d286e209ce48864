//! Config validation logic.
//! Fatal pre-conditions checked before any mutation: both bases exist and are
//! directories, the source is readable, the destination writable, and the two
//! canonical roots are distinct, disjoint and on the same filesystem.

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use super::types::Config;
use crate::errors::TreeMoveError;
use crate::platform::is_writable_probe;

impl Config {
    /// Validate the bases and replace them with their canonical forms.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure_dir_exists_and_is_dir(&self.source_base, "source_base", TreeMoveError::SourceMissing)?;
        ensure_readable(&self.source_base, "source_base")?;

        // The destination is never created here: a missing destination usually
        // means an unmounted volume, and migrating onto the mount point would be wrong.
        ensure_dir_exists_and_is_dir(&self.dest_base, "dest_base", TreeMoveError::DestMissing)?;
        ensure_writable(&self.dest_base, "dest_base")?;

        let src_real = dunce::canonicalize(&self.source_base)
            .with_context(|| format!("resolve source_base '{}'", self.source_base.display()))?;
        let dst_real = dunce::canonicalize(&self.dest_base)
            .with_context(|| format!("resolve dest_base '{}'", self.dest_base.display()))?;

        if src_real == dst_real {
            error!("source_base and dest_base resolve to the same path: {}", src_real.display());
            return Err(TreeMoveError::SameRoot(src_real).into());
        }
        if src_real.starts_with(&dst_real) {
            return Err(TreeMoveError::NestedRoots {
                inner: src_real,
                outer: dst_real,
            }
            .into());
        }
        if dst_real.starts_with(&src_real) {
            return Err(TreeMoveError::NestedRoots {
                inner: dst_real,
                outer: src_real,
            }
            .into());
        }

        let src_dev = fs::metadata(&src_real)?.dev();
        let dst_dev = fs::metadata(&dst_real)?.dev();
        if src_dev != dst_dev {
            error!(
                "source_base '{}' and dest_base '{}' are on different filesystems",
                src_real.display(),
                dst_real.display()
            );
            return Err(TreeMoveError::CrossDevice {
                source_base: src_real,
                dest_base: dst_real,
            }
            .into());
        }

        info!(
            "Config validated: source='{}' dest='{}' stale_minutes={}",
            src_real.display(),
            dst_real.display(),
            self.stale_minutes()
        );
        self.source_base = src_real;
        self.dest_base = dst_real;
        Ok(())
    }
}

/// Ensure path exists and is a directory; emit clear errors with path context.
fn ensure_dir_exists_and_is_dir(
    path: &Path,
    name: &'static str,
    missing: fn(PathBuf) -> TreeMoveError,
) -> Result<()> {
    if !path.exists() {
        error!("{name} does not exist: {}", path.display());
        return Err(missing(path.to_path_buf()).into());
    }
    if !path.is_dir() {
        error!("{name} is not a directory: {}", path.display());
        return Err(TreeMoveError::NotADirectory {
            name,
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(())
}

/// Ensure directory is readable by attempting to open its entries.
fn ensure_readable(path: &Path, name: &str) -> Result<()> {
    fs::read_dir(path).with_context(|| {
        format!("Cannot read {name} directory '{}'; check permissions", path.display())
    })?;
    debug!("{name} readable: {}", path.display());
    Ok(())
}

/// Ensure directory is writable using a non-destructive probe file.
fn ensure_writable(path: &Path, name: &str) -> Result<()> {
    is_writable_probe(path).with_context(|| {
        format!("Cannot write to {name} '{}'; check permissions", path.display())
    })?;
    debug!("{name} writable: {}", path.display());
    Ok(())
}
