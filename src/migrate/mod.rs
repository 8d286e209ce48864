//! Migration of classified entries.
//!
//! Buckets are processed in order: structural, new files, colliding files,
//! same-name files. Each entry is one independent action; a failure is
//! recorded and the next entry is attempted.
//!
//! Guarantees:
//! - No destination file is replaced: every move goes through `move_no_clobber`.
//! - A source file is deleted only right after `DuplicateVerifier` reported it
//!   byte-identical to its destination counterpart.
//! - Source directories are left in place for the reaper.

mod deconflict;
mod verify;

pub use deconflict::{CollisionResolver, DeconflictStyle, MARKER, deconflicted_name, timestamp_token};
pub use verify::{DuplicateVerifier, Verdict};

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::audit::{Action, ErrorDetail, MigrationOutcome};
use crate::classify::{ChangeBucket, Classified};
use crate::context::{Completion, RunContext};
use crate::diff::{DiffEntry, ItemKind};
use crate::fs_ops::{move_no_clobber, replicate_entry};
use crate::shutdown;

pub struct Migrator<'a> {
    source_root: &'a Path,
    dest_root: &'a Path,
    resolver: CollisionResolver,
    verifier: DuplicateVerifier,
}

impl<'a> Migrator<'a> {
    pub fn new(source_root: &'a Path, dest_root: &'a Path, style: DeconflictStyle) -> Self {
        Self {
            source_root,
            dest_root,
            resolver: CollisionResolver::new(style),
            verifier: DuplicateVerifier::new(),
        }
    }

    fn paths(&self, entry: &DiffEntry) -> (PathBuf, PathBuf) {
        (
            self.source_root.join(&entry.rel_path),
            self.dest_root.join(&entry.rel_path),
        )
    }

    /// Apply every bucket of `classified`.
    pub fn run(&mut self, classified: &Classified, ctx: &mut RunContext<'_>) -> Completion {
        for bucket in ChangeBucket::ALL {
            let entries = classified.bucket(bucket);
            if entries.is_empty() {
                continue;
            }
            debug!(%bucket, count = entries.len(), "processing bucket");
            for entry in entries {
                if shutdown::is_requested() {
                    debug!(%bucket, "shutdown requested; stopping migration");
                    return Completion::Interrupted;
                }
                let outcome = self.migrate_entry(bucket, entry, ctx.is_dry_run());
                ctx.record(outcome);
            }
        }
        Completion::Finished
    }

    /// Perform (or, in dry-run, plan) the action for one entry.
    pub fn migrate_entry(&mut self, bucket: ChangeBucket, entry: &DiffEntry, dry_run: bool) -> MigrationOutcome {
        match bucket {
            ChangeBucket::Structural => self.replicate(entry, dry_run),
            ChangeBucket::NewFile => self.move_new(entry, dry_run),
            ChangeBucket::CollidingFile => self.move_deconflicted(entry, Action::MoveDeconflicted, dry_run),
            ChangeBucket::SameNameFile => self.resolve_same_name(entry, dry_run),
        }
    }

    fn replicate(&mut self, entry: &DiffEntry, dry_run: bool) -> MigrationOutcome {
        let bits = entry.bits();
        let (src, dst) = self.paths(entry);
        if dry_run {
            return MigrationOutcome::succeeded(Action::Replicate, bits, &src, &dst);
        }
        if let Err(e) = replicate_entry(&src, &dst) {
            let detail = ErrorDetail::from_io("replicate", &dst, &e);
            return MigrationOutcome::failed(Action::Replicate, bits, &src, &dst, detail);
        }
        if entry.kind != ItemKind::Dir
            && let Err(e) = fs::remove_file(&src)
        {
            let detail = ErrorDetail::from_io("remove replicated source", &src, &e);
            return MigrationOutcome::failed(Action::Replicate, bits, &src, &dst, detail);
        }
        MigrationOutcome::succeeded(Action::Replicate, bits, &src, &dst)
    }

    fn move_new(&mut self, entry: &DiffEntry, dry_run: bool) -> MigrationOutcome {
        let bits = entry.bits();
        let (src, dst) = self.paths(entry);
        if dry_run {
            return MigrationOutcome::succeeded(Action::Move, bits, &src, &dst);
        }
        match move_no_clobber(&src, &dst) {
            Ok(()) => MigrationOutcome::succeeded(Action::Move, bits, &src, &dst),
            Err(e) => {
                let detail = ErrorDetail::from_io("move", &dst, &e);
                MigrationOutcome::failed(Action::Move, bits, &src, &dst, detail)
            }
        }
    }

    fn move_deconflicted(&mut self, entry: &DiffEntry, action: Action, dry_run: bool) -> MigrationOutcome {
        let bits = entry.bits();
        let (src, dst) = self.paths(entry);
        let target = self.resolver.resolve(&dst);
        if dry_run {
            return MigrationOutcome::succeeded(action, bits, &src, &target);
        }
        match move_no_clobber(&src, &target) {
            Ok(()) => MigrationOutcome::succeeded(action, bits, &src, &target),
            Err(e) => {
                let detail = ErrorDetail::from_io("move", &target, &e);
                MigrationOutcome::failed(action, bits, &src, &target, detail)
            }
        }
    }

    fn resolve_same_name(&mut self, entry: &DiffEntry, dry_run: bool) -> MigrationOutcome {
        let bits = entry.bits();
        let (src, dst) = self.paths(entry);
        match self.verifier.verify(&src, &dst) {
            Ok(Verdict::Identical) => {
                if dry_run {
                    return MigrationOutcome::succeeded(Action::DeleteDuplicate, bits, &src, &dst);
                }
                match fs::remove_file(&src) {
                    Ok(()) => MigrationOutcome::succeeded(Action::DeleteDuplicate, bits, &src, &dst),
                    Err(e) => {
                        let detail = ErrorDetail::from_io("delete duplicate", &src, &e);
                        MigrationOutcome::failed(Action::DeleteDuplicate, bits, &src, &dst, detail)
                    }
                }
            }
            Ok(Verdict::Different) => self.move_deconflicted(entry, Action::PreserveDistinct, dry_run),
            Err(e) => {
                let detail = ErrorDetail::from_io("verify duplicate", &src, &e);
                MigrationOutcome::failed(Action::DeleteDuplicate, bits, &src, &dst, detail)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use crate::diff::{ChangeKind, UpdateType};
    use tempfile::tempdir;

    struct Trees {
        _td: tempfile::TempDir,
        src: PathBuf,
        dst: PathBuf,
    }

    fn trees() -> Trees {
        let td = tempdir().unwrap();
        let src = td.path().join("src");
        let dst = td.path().join("dst");
        fs::create_dir(&src).unwrap();
        fs::create_dir(&dst).unwrap();
        Trees { _td: td, src, dst }
    }

    fn file(rel: &str) -> DiffEntry {
        DiffEntry::new(rel, ItemKind::File, UpdateType::Received)
    }

    #[test]
    fn new_file_never_replaces_existing_destination() {
        let t = trees();
        fs::write(t.src.join("a.txt"), b"new").unwrap();
        fs::write(t.dst.join("a.txt"), b"old").unwrap();

        let mut m = Migrator::new(&t.src, &t.dst, DeconflictStyle::Append);
        let out = m.migrate_entry(ChangeBucket::NewFile, &file("a.txt").created(), false);

        assert!(!out.is_success());
        assert_eq!(fs::read(t.src.join("a.txt")).unwrap(), b"new");
        assert_eq!(fs::read(t.dst.join("a.txt")).unwrap(), b"old");
    }

    #[test]
    fn colliding_file_moves_under_deconflicted_name() {
        let t = trees();
        fs::write(t.src.join("report.csv"), b"new,longer").unwrap();
        fs::write(t.dst.join("report.csv"), b"old").unwrap();

        let mut m = Migrator::new(&t.src, &t.dst, DeconflictStyle::Append);
        let entry = file("report.csv").with_changes(&[ChangeKind::Size]);
        let out = m.migrate_entry(ChangeBucket::CollidingFile, &entry, false);

        assert!(out.is_success());
        assert_eq!(out.action, Action::MoveDeconflicted);
        assert!(!t.src.join("report.csv").exists());
        assert_eq!(fs::read(t.dst.join("report.csv")).unwrap(), b"old");
        assert_eq!(fs::read(&out.dest).unwrap(), b"new,longer");
        assert!(out.dest.to_string_lossy().contains("report.csv-deconflicted-"));
    }

    #[test]
    fn same_name_identical_deletes_source_only() {
        let t = trees();
        fs::write(t.src.join("notes.txt"), b"same").unwrap();
        fs::write(t.dst.join("notes.txt"), b"same").unwrap();

        let mut m = Migrator::new(&t.src, &t.dst, DeconflictStyle::Append);
        let entry = file("notes.txt").with_changes(&[ChangeKind::Time]);
        let out = m.migrate_entry(ChangeBucket::SameNameFile, &entry, false);

        assert_eq!(out.action, Action::DeleteDuplicate);
        assert!(out.is_success());
        assert!(!t.src.join("notes.txt").exists());
        assert_eq!(fs::read(t.dst.join("notes.txt")).unwrap(), b"same");
    }

    #[test]
    fn same_name_different_bytes_survives_as_distinct() {
        let t = trees();
        fs::write(t.src.join("report.csv"), b"abc").unwrap();
        fs::write(t.dst.join("report.csv"), b"abd").unwrap();

        let mut m = Migrator::new(&t.src, &t.dst, DeconflictStyle::Append);
        let entry = DiffEntry::new("report.csv", ItemKind::File, UpdateType::Unchanged);
        let out = m.migrate_entry(ChangeBucket::SameNameFile, &entry, false);

        assert_eq!(out.action, Action::PreserveDistinct);
        assert!(out.is_success());
        assert_eq!(fs::read(&out.dest).unwrap(), b"abc");
        assert_eq!(fs::read(t.dst.join("report.csv")).unwrap(), b"abd");
    }

    #[test]
    fn structural_symlink_is_replicated_then_removed_from_source() {
        let t = trees();
        std::os::unix::fs::symlink("album", t.src.join("latest")).unwrap();

        let mut m = Migrator::new(&t.src, &t.dst, DeconflictStyle::Append);
        let entry = DiffEntry::new("latest", ItemKind::Symlink, UpdateType::LocalChange).created();
        let out = m.migrate_entry(ChangeBucket::Structural, &entry, false);

        assert!(out.is_success());
        assert!(fs::symlink_metadata(t.src.join("latest")).is_err());
        assert_eq!(fs::read_link(t.dst.join("latest")).unwrap(), Path::new("album"));
    }

    #[test]
    fn structural_directory_stays_in_source() {
        let t = trees();
        fs::create_dir(t.src.join("album")).unwrap();
        let mut m = Migrator::new(&t.src, &t.dst, DeconflictStyle::Append);
        let entry = DiffEntry::new("album", ItemKind::Dir, UpdateType::LocalChange).created();
        assert!(m.migrate_entry(ChangeBucket::Structural, &entry, false).is_success());
        assert!(t.src.join("album").is_dir());
        assert!(t.dst.join("album").is_dir());
    }

    #[test]
    fn dry_run_touches_nothing() {
        let t = trees();
        fs::write(t.src.join("photo.jpg"), b"jpg").unwrap();
        fs::write(t.src.join("dup"), b"d").unwrap();
        fs::write(t.dst.join("dup"), b"d").unwrap();

        let sink = MemoryAuditLog::new();
        let mut ctx = RunContext::new(&sink, true);
        let mut m = Migrator::new(&t.src, &t.dst, DeconflictStyle::Append);
        let a = m.migrate_entry(ChangeBucket::NewFile, &file("photo.jpg").created(), ctx.is_dry_run());
        let b = m.migrate_entry(ChangeBucket::SameNameFile, &file("dup"), ctx.is_dry_run());
        ctx.record(a);
        ctx.record(b);

        assert!(t.src.join("photo.jpg").exists());
        assert!(t.src.join("dup").exists());
        assert!(!t.dst.join("photo.jpg").exists());
        assert_eq!(ctx.counters.change_count, 2);
        assert!(sink.lines().is_empty());
    }
}
