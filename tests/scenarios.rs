use filetime::{FileTime, set_file_mtime};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

use tree_move::{
    CycleOptions, DeconflictStyle, MemoryAuditLog, OwnershipRules, PreserveSet, RunSummary, WalkDiffer, run_cycle,
};

struct Trees {
    _td: TempDir,
    src: PathBuf,
    dst: PathBuf,
}

/// Canonical source/destination roots on the same filesystem.
fn trees() -> Trees {
    let td = tempdir().unwrap();
    let root = dunce::canonicalize(td.path()).unwrap();
    let src = root.join("incoming");
    let dst = root.join("library");
    fs::create_dir(&src).unwrap();
    fs::create_dir(&dst).unwrap();
    Trees { _td: td, src, dst }
}

fn minutes_ago(path: &Path, minutes: i64) {
    let now = FileTime::now();
    set_file_mtime(path, FileTime::from_unix_time(now.unix_seconds() - minutes * 60, 0)).unwrap();
}

fn cycle(t: &Trees, preserve: &PreserveSet, sink: &MemoryAuditLog) -> RunSummary {
    let opts = CycleOptions {
        source_base: &t.src,
        dest_base: &t.dst,
        stale_after: Duration::from_secs(15 * 60),
        deconflict_style: DeconflictStyle::Append,
        dry_run: false,
    };
    run_cycle(&opts, &WalkDiffer::default(), preserve, &OwnershipRules::new(), sink).unwrap()
}

/// New file is moved to the same relative path and audited.
#[test]
fn new_file_is_moved_unchanged() {
    let t = trees();
    fs::write(t.src.join("photo.jpg"), b"jpeg bytes").unwrap();

    let sink = MemoryAuditLog::new();
    let summary = cycle(&t, &PreserveSet::new(), &sink);

    assert!(!t.src.join("photo.jpg").exists(), "source should no longer hold the file");
    assert_eq!(fs::read(t.dst.join("photo.jpg")).unwrap(), b"jpeg bytes");
    assert_eq!(summary.changes, 1);
    assert_eq!(summary.warnings, 0);

    let lines = sink.lines();
    assert_eq!(lines.len(), 1, "{lines:?}");
    let expected = format!(
        ">f+++++++++\t\"{}\"\t\"{}\"\tmove",
        t.src.join("photo.jpg").display(),
        t.dst.join("photo.jpg").display()
    );
    assert!(lines[0].ends_with(&expected), "{}", lines[0]);
}

/// Identical bytes with a newer destination mtime: the source copy is a verified duplicate.
#[test]
fn identical_duplicate_is_deleted_from_source() {
    let t = trees();
    fs::write(t.src.join("notes.txt"), b"same notes").unwrap();
    fs::write(t.dst.join("notes.txt"), b"same notes").unwrap();
    minutes_ago(&t.src.join("notes.txt"), 60);
    let dst_mtime_before = fs::metadata(t.dst.join("notes.txt")).unwrap().modified().unwrap();

    let sink = MemoryAuditLog::new();
    let summary = cycle(&t, &PreserveSet::new(), &sink);

    assert!(!t.src.join("notes.txt").exists());
    assert_eq!(fs::read(t.dst.join("notes.txt")).unwrap(), b"same notes");
    assert_eq!(
        fs::metadata(t.dst.join("notes.txt")).unwrap().modified().unwrap(),
        dst_mtime_before,
        "destination must be untouched"
    );
    assert_eq!(summary.changes, 1);
    assert!(sink.lines()[0].ends_with("\tdelete-duplicate"));
}

/// Same size and mtime but different bytes: both copies survive.
#[test]
fn same_name_different_content_is_deconflicted() {
    let t = trees();
    fs::write(t.src.join("report.csv"), b"1,2,3").unwrap();
    fs::write(t.dst.join("report.csv"), b"1,2,4").unwrap();
    let ts = FileTime::from_unix_time(1_650_000_000, 0);
    set_file_mtime(t.src.join("report.csv"), ts).unwrap();
    set_file_mtime(t.dst.join("report.csv"), ts).unwrap();

    let sink = MemoryAuditLog::new();
    let summary = cycle(&t, &PreserveSet::new(), &sink);

    assert!(!t.src.join("report.csv").exists());
    assert_eq!(fs::read(t.dst.join("report.csv")).unwrap(), b"1,2,4");
    let renamed: Vec<_> = fs::read_dir(&t.dst)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("report.csv-deconflicted-"))
        .collect();
    assert_eq!(renamed.len(), 1, "{renamed:?}");
    assert_eq!(fs::read(t.dst.join(&renamed[0])).unwrap(), b"1,2,3");
    assert_eq!(summary.changes, 1);
    assert!(sink.lines()[0].ends_with("\tpreserve-distinct"));
}

/// Stale empty directory is reclaimed; a preserved sibling of the same age is kept.
#[test]
fn stale_directory_removed_preserved_sibling_kept() {
    let t = trees();
    let stale = t.src.join("2019-01-01");
    let kept = t.src.join("2019-01-02");
    fs::create_dir(&stale).unwrap();
    fs::create_dir(&kept).unwrap();
    minutes_ago(&stale, 20);
    minutes_ago(&kept, 20);

    let preserve = PreserveSet::parse("2019-01-02\n", &t.src);
    let sink = MemoryAuditLog::new();
    let summary = cycle(&t, &preserve, &sink);

    assert!(!stale.exists(), "stale directory should be removed");
    assert!(kept.exists(), "preserved directory must be retained");
    assert_eq!(summary.dirs_removed, 1);
    assert!(
        sink.lines()
            .iter()
            .any(|l| l.ends_with("\tremove-dir") && l.contains("*deleting")),
        "{:?}",
        sink.lines()
    );
}

/// A tree mixing every bucket: nothing in the destination is replaced.
#[test]
fn mixed_tree_never_overwrites_destination() {
    let t = trees();
    fs::create_dir_all(t.src.join("album/disc2")).unwrap();
    fs::write(t.src.join("album/a.flac"), b"new track").unwrap();
    fs::write(t.src.join("album/disc2/b.flac"), b"source b, longer").unwrap();
    fs::create_dir_all(t.dst.join("album/disc2")).unwrap();
    fs::write(t.dst.join("album/disc2/b.flac"), b"dest b").unwrap();
    std::os::unix::fs::symlink("a.flac", t.src.join("album/latest")).unwrap();

    let before: Vec<(PathBuf, Vec<u8>)> = vec![(t.dst.join("album/disc2/b.flac"), b"dest b".to_vec())];

    let sink = MemoryAuditLog::new();
    let summary = cycle(&t, &PreserveSet::new(), &sink);

    for (path, bytes) in before {
        assert_eq!(fs::read(&path).unwrap(), bytes, "{} was modified", path.display());
    }
    assert_eq!(fs::read(t.dst.join("album/a.flac")).unwrap(), b"new track");
    assert_eq!(fs::read_link(t.dst.join("album/latest")).unwrap(), PathBuf::from("a.flac"));
    assert!(!t.src.join("album/latest").exists(), "replicated symlink is removed from the source");
    assert!(t.src.join("album").is_dir(), "source directories are left for the reaper");
    assert_eq!(summary.warnings, 0, "{:?}", sink.lines());

    let deconflicted = fs::read_dir(t.dst.join("album/disc2"))
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with("b.flac-deconflicted-")
        })
        .count();
    assert_eq!(deconflicted, 1);
}

/// Dry-run plans the same actions but changes nothing and writes no audit lines.
#[test]
fn dry_run_changes_nothing() {
    let t = trees();
    fs::write(t.src.join("photo.jpg"), b"jpeg").unwrap();
    let old = t.src.join("old");
    fs::create_dir(&old).unwrap();
    minutes_ago(&old, 30);

    let opts = CycleOptions {
        source_base: &t.src,
        dest_base: &t.dst,
        stale_after: Duration::from_secs(15 * 60),
        deconflict_style: DeconflictStyle::Append,
        dry_run: true,
    };
    let sink = MemoryAuditLog::new();
    let summary = run_cycle(&opts, &WalkDiffer::default(), &PreserveSet::new(), &OwnershipRules::new(), &sink).unwrap();

    assert!(t.src.join("photo.jpg").exists());
    assert!(!t.dst.join("photo.jpg").exists());
    assert!(old.exists());
    assert!(!t.dst.join("old").exists());
    assert!(sink.lines().is_empty());
    assert!(summary.dry_run);
    assert!(summary.changes >= 2, "planned actions are still counted: {summary:?}");
}

/// A second run over the same trees finds nothing left to do.
#[test]
fn second_run_is_quiet() {
    let t = trees();
    fs::write(t.src.join("a.txt"), b"a").unwrap();
    let sink = MemoryAuditLog::new();
    cycle(&t, &PreserveSet::new(), &sink);

    let again = MemoryAuditLog::new();
    let summary = cycle(&t, &PreserveSet::new(), &again);
    assert_eq!(summary.changes, 0);
    assert!(again.lines().is_empty(), "{:?}", again.lines());
}
