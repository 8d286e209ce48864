//! Stale source directory removal.
//!
//! Per candidate: Found -> preserved? -> {Skipped | RemovalAttempted} -> {Removed | RemovalFailed}.
//!
//! Notes:
//! - Candidates are directories below the source root (never the root itself)
//!   that were empty when enumerated and whose mtime is older than the threshold.
//! - Preserve-set membership is an exact path match.
//! - Removal uses `rmdir`, which fails on a directory that gained entries after
//!   enumeration; that is a warning, never a forced delete.
//! - Removing a child bumps its parent's mtime, so nested empty directories are
//!   reclaimed one level per run.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::audit::{Action, ErrorDetail, MigrationOutcome, REMOVE_DIR_BITS};
use crate::context::{Completion, RunContext};
use crate::preserve::PreserveSet;
use crate::shutdown;

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(15 * 60);

/// Final state of one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReapState {
    Skipped,
    Removed,
    RemovalFailed(ErrorDetail),
}

pub struct StaleDirectoryReaper<'a> {
    source_root: &'a Path,
    stale_after: Duration,
    preserve: &'a PreserveSet,
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut it| it.next().is_none())
        .unwrap_or(false)
}

impl<'a> StaleDirectoryReaper<'a> {
    pub fn new(source_root: &'a Path, stale_after: Duration, preserve: &'a PreserveSet) -> Self {
        Self {
            source_root,
            stale_after,
            preserve,
        }
    }

    fn is_stale(&self, modified: SystemTime, now: SystemTime) -> bool {
        now.duration_since(modified)
            .map(|age| age > self.stale_after)
            .unwrap_or(false)
    }

    /// Empty directories idle longer than the threshold, deepest first.
    pub fn candidates(&self, now: SystemTime, ctx: &mut RunContext<'_>) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let walker = WalkDir::new(self.source_root)
            .min_depth(1)
            .follow_links(false)
            .contents_first(true)
            .sort_by_file_name();
        for res in walker {
            let entry = match res {
                Ok(e) => e,
                Err(e) => {
                    ctx.warn(format_args!("reaper: cannot enumerate: {}", e));
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            let Ok(meta) = entry.metadata() else { continue };
            let Ok(modified) = meta.modified() else { continue };
            if self.is_stale(modified, now) && is_empty_dir(entry.path()) {
                trace!(dir = %entry.path().display(), "stale empty directory");
                out.push(entry.into_path());
            }
        }
        out
    }

    /// Decide and (unless dry-run) act on one candidate.
    pub fn reap_one(&self, dir: &Path, dry_run: bool) -> (ReapState, Option<MigrationOutcome>) {
        if self.preserve.contains_dir(dir, self.source_root) {
            debug!(dir = %dir.display(), "preserved; not removing");
            return (ReapState::Skipped, None);
        }
        if dry_run {
            let outcome = MigrationOutcome::succeeded(Action::RemoveDir, REMOVE_DIR_BITS, dir, dir);
            return (ReapState::Removed, Some(outcome));
        }
        match fs::remove_dir(dir) {
            Ok(()) => {
                let outcome = MigrationOutcome::succeeded(Action::RemoveDir, REMOVE_DIR_BITS, dir, dir);
                (ReapState::Removed, Some(outcome))
            }
            Err(e) => {
                let detail = ErrorDetail::from_io("remove directory", dir, &e);
                let outcome =
                    MigrationOutcome::failed(Action::RemoveDir, REMOVE_DIR_BITS, dir, dir, detail.clone());
                (ReapState::RemovalFailed(detail), Some(outcome))
            }
        }
    }

    pub fn run(&self, ctx: &mut RunContext<'_>) -> Completion {
        let candidates = self.candidates(SystemTime::now(), ctx);
        debug!(count = candidates.len(), stale_after_secs = self.stale_after.as_secs(), "reaper candidates");
        for dir in candidates {
            if shutdown::is_requested() {
                debug!("shutdown requested; stopping reaper");
                return Completion::Interrupted;
            }
            if let (_, Some(outcome)) = self.reap_one(&dir, ctx.is_dry_run()) {
                ctx.record(outcome);
            }
        }
        Completion::Finished
    }
}
