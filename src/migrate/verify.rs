//! Byte-level duplicate confirmation.
//! A source file may only be discarded after this check says `Identical`
//! against the exact destination file it shadows.

use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

use crate::fs_ops::files_identical;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Identical,
    Different,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DuplicateVerifier;

impl DuplicateVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Compare full contents of `source` and `dest`. Anything that is not a
    /// pair of regular files (e.g. a destination symlink) is `Different`.
    pub fn verify(&self, source: &Path, dest: &Path) -> io::Result<Verdict> {
        let src_meta = fs::symlink_metadata(source)?;
        let dst_meta = fs::symlink_metadata(dest)?;
        if !src_meta.file_type().is_file() || !dst_meta.file_type().is_file() {
            debug!(src = %source.display(), dest = %dest.display(), "not a pair of regular files");
            return Ok(Verdict::Different);
        }
        let verdict = if files_identical(source, dest)? {
            Verdict::Identical
        } else {
            Verdict::Different
        };
        debug!(src = %source.display(), dest = %dest.display(), ?verdict, "content verified");
        Ok(verdict)
    }
}
