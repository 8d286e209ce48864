//! Change classification.
//!
//! Every diff record either lands in exactly one `ChangeBucket` or is dropped
//! for a named `DropReason`. Malformed records are counted as warnings and
//! excluded from all buckets.

use std::fmt;
use std::path::Path;
use tracing::{debug, trace};

use crate::context::RunContext;
use crate::diff::{ChangeKind, DiffEntry, DiffItem, ItemKind, UpdateType};
use crate::preserve::PreserveSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeBucket {
    /// Directory, symlink, device or special item needing creation or attribute reconciliation.
    Structural,
    /// File with no destination counterpart.
    NewFile,
    /// File whose size or content provably differs from the destination file.
    CollidingFile,
    /// File that looks like the destination file by metadata; must be verified.
    SameNameFile,
}

impl ChangeBucket {
    /// Processing order used by the migrator.
    pub const ALL: [ChangeBucket; 4] = [
        ChangeBucket::Structural,
        ChangeBucket::NewFile,
        ChangeBucket::CollidingFile,
        ChangeBucket::SameNameFile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeBucket::Structural => "structural",
            ChangeBucket::NewFile => "new-file",
            ChangeBucket::CollidingFile => "colliding-file",
            ChangeBucket::SameNameFile => "same-name-file",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ChangeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DropReason {
    /// Directory listed in the preserve set.
    Preserved,
    /// Record for the tree root itself.
    Root,
    /// Informational record (e.g. rsync's `*deleting`).
    Message,
    /// Directory with nothing to reconcile.
    UnchangedDir,
}

impl DropReason {
    pub const ALL: [DropReason; 4] = [
        DropReason::Preserved,
        DropReason::Root,
        DropReason::Message,
        DropReason::UnchangedDir,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Preserved => "preserved",
            DropReason::Root => "root",
            DropReason::Message => "message",
            DropReason::UnchangedDir => "unchanged-dir",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a single record goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Bucket(ChangeBucket),
    Dropped(DropReason),
}

/// Decide the fate of one well-formed record.
pub fn disposition(entry: &DiffEntry, preserve: &PreserveSet, source_root: &Path) -> Disposition {
    if entry.update == UpdateType::Message {
        return Disposition::Dropped(DropReason::Message);
    }
    if entry.is_root() {
        return Disposition::Dropped(DropReason::Root);
    }

    if entry.kind != ItemKind::File {
        if entry.kind == ItemKind::Dir {
            if preserve.contains_dir(&source_root.join(&entry.rel_path), source_root) {
                return Disposition::Dropped(DropReason::Preserved);
            }
            if entry.update == UpdateType::Unchanged && entry.changes.is_empty() && !entry.created {
                return Disposition::Dropped(DropReason::UnchangedDir);
            }
        }
        return Disposition::Bucket(ChangeBucket::Structural);
    }

    if entry.created {
        Disposition::Bucket(ChangeBucket::NewFile)
    } else if entry.changes.contains(ChangeKind::Size) || entry.changes.contains(ChangeKind::Checksum) {
        Disposition::Bucket(ChangeBucket::CollidingFile)
    } else {
        // Time-only (or no) difference: not proof of different content.
        Disposition::Bucket(ChangeBucket::SameNameFile)
    }
}

/// Records partitioned by bucket, plus per-reason drop counts.
#[derive(Debug, Default, Clone)]
pub struct Classified {
    buckets: [Vec<DiffEntry>; 4],
    dropped: [usize; 4],
    pub malformed: usize,
}

impl Classified {
    pub fn bucket(&self, bucket: ChangeBucket) -> &[DiffEntry] {
        &self.buckets[bucket.index()]
    }

    pub fn bucket_len(&self, bucket: ChangeBucket) -> usize {
        self.buckets[bucket.index()].len()
    }

    pub fn dropped(&self, reason: DropReason) -> usize {
        self.dropped[reason.index()]
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum::<usize>() + self.dropped.iter().sum::<usize>() + self.malformed
    }
}

/// Partition differ output. Input order is kept within each bucket.
pub fn classify(
    items: Vec<DiffItem>,
    preserve: &PreserveSet,
    source_root: &Path,
    ctx: &mut RunContext<'_>,
) -> Classified {
    let mut out = Classified::default();
    for item in items {
        let entry = match item {
            Ok(e) => e,
            Err(bad) => {
                out.malformed += 1;
                ctx.warn(format_args!("skipping malformed diff record: {}", bad));
                continue;
            }
        };
        match disposition(&entry, preserve, source_root) {
            Disposition::Dropped(reason) => {
                trace!(path = %entry.rel_path.display(), bits = %entry.bits(), %reason, "dropped");
                out.dropped[reason.index()] += 1;
            }
            Disposition::Bucket(bucket) => {
                trace!(path = %entry.rel_path.display(), bits = %entry.bits(), %bucket, "classified");
                out.buckets[bucket.index()].push(entry);
            }
        }
    }
    debug!(
        structural = out.bucket_len(ChangeBucket::Structural),
        new_files = out.bucket_len(ChangeBucket::NewFile),
        colliding = out.bucket_len(ChangeBucket::CollidingFile),
        same_name = out.bucket_len(ChangeBucket::SameNameFile),
        malformed = out.malformed,
        "classification complete"
    );
    out
}
