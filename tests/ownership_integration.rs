use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::{TempDir, tempdir};

use tree_move::{
    CycleOptions, DeconflictStyle, MemoryAuditLog, OwnershipRules, PreserveSet, RunSummary, WalkDiffer, run_cycle,
};

fn own_ids() -> (u32, u32) {
    unsafe { (libc::geteuid(), libc::getegid()) }
}

struct Trees {
    _td: TempDir,
    root: PathBuf,
    src: PathBuf,
    dst: PathBuf,
}

fn trees() -> Trees {
    let td = tempdir().unwrap();
    let root = dunce::canonicalize(td.path()).unwrap();
    let src = root.join("src");
    let dst = root.join("dst");
    fs::create_dir(&src).unwrap();
    fs::create_dir(&dst).unwrap();
    Trees { _td: td, root, src, dst }
}

fn cycle(t: &Trees, rules: &OwnershipRules, sink: &MemoryAuditLog) -> RunSummary {
    let opts = CycleOptions {
        source_base: &t.src,
        dest_base: &t.dst,
        stale_after: Duration::from_secs(900),
        deconflict_style: DeconflictStyle::Append,
        dry_run: false,
    };
    run_cycle(&opts, &WalkDiffer::default(), &PreserveSet::new(), rules, sink).unwrap()
}

#[test]
fn rules_apply_after_a_successful_migration() {
    let t = trees();
    fs::create_dir_all(t.dst.join("photos")).unwrap();
    fs::create_dir_all(t.src.join("photos")).unwrap();
    fs::write(t.src.join("photos/new.jpg"), b"jpg").unwrap();

    let (uid, gid) = own_ids();
    let list = t.root.join("owners.tsv");
    fs::write(&list, format!("# owner\tpath\n{uid}:{gid}\tphotos\nthis line has no tab\n")).unwrap();
    let rules = OwnershipRules::load(&list).unwrap();
    assert_eq!(rules.rules().len(), 1);
    assert_eq!(rules.rejected().len(), 1);

    let sink = MemoryAuditLog::new();
    let summary = cycle(&t, &rules, &sink);

    assert_eq!(summary.ownership_applied, 1);
    assert_eq!(summary.warnings, 1, "the malformed rule line is a warning");
    let meta = fs::metadata(t.dst.join("photos/new.jpg")).unwrap();
    assert_eq!((meta.uid(), meta.gid()), (uid, gid));
    assert!(sink.lines().iter().any(|l| l.ends_with("\tchown")));
}

#[test]
fn no_migration_means_no_ownership_pass() {
    let t = trees();
    fs::create_dir_all(t.dst.join("photos")).unwrap();
    let (uid, gid) = own_ids();
    let rules = OwnershipRules::parse(&format!("{uid}:{gid}\tphotos\n"));

    let sink = MemoryAuditLog::new();
    let summary = cycle(&t, &rules, &sink);
    assert_eq!(summary.ownership_applied, 0);
    assert!(sink.lines().is_empty());
}

#[test]
fn symlinked_target_outside_destination_is_skipped() {
    let t = trees();
    let outside = t.root.join("elsewhere");
    fs::create_dir(&outside).unwrap();
    std::os::unix::fs::symlink(&outside, t.dst.join("escape")).unwrap();
    fs::write(t.src.join("trigger.txt"), b"x").unwrap();

    let (uid, gid) = own_ids();
    let rules = OwnershipRules::parse(&format!("{uid}:{gid}\tescape\n{uid}:{gid}\t{}\n", outside.display()));

    let sink = MemoryAuditLog::new();
    let summary = cycle(&t, &rules, &sink);
    assert_eq!(summary.changes, 1);
    assert_eq!(summary.ownership_applied, 0);
    assert_eq!(summary.warnings, 0);
    assert!(!sink.lines().iter().any(|l| l.ends_with("\tchown")));
}
