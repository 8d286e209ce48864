//! Native tree differ.
//! Walks the source tree (no symlink following) and compares every entry with the
//! destination entry at the same relative path.
//!
//! Notes:
//! - Unchanged files are reported too, so same-named files always reach duplicate
//!   verification instead of being silently skipped.
//! - Modification times are compared at whole-second resolution.
//! - In checksum mode, same-size file pairs are compared byte-for-byte in parallel.

use anyhow::Result;
use rayon::prelude::*;
use std::fs::{self, FileType, Metadata};
use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

use super::{ChangeKind, ChangeSet, DiffEntry, DiffItem, ItemKind, MalformedEntry, TreeDiffer, UpdateType};
use crate::fs_ops::files_identical;

/// Differ that walks both trees directly.
#[derive(Debug, Clone, Default)]
pub struct WalkDiffer {
    /// Compare file contents when size matches (slower, catches same-size edits).
    pub checksum: bool,
}

impl WalkDiffer {
    pub fn new(checksum: bool) -> Self {
        Self { checksum }
    }
}

pub(crate) fn kind_of(ft: &FileType) -> ItemKind {
    if ft.is_dir() {
        ItemKind::Dir
    } else if ft.is_symlink() {
        ItemKind::Symlink
    } else if ft.is_block_device() || ft.is_char_device() {
        ItemKind::Device
    } else if ft.is_fifo() || ft.is_socket() {
        ItemKind::Special
    } else {
        ItemKind::File
    }
}

fn attribute_changes(kind: ItemKind, src: &Metadata, dst: &Metadata, changes: &mut ChangeSet) {
    if kind == ItemKind::File && src.len() != dst.len() {
        changes.insert(ChangeKind::Size);
    }
    if kind != ItemKind::Symlink {
        if src.mtime() != dst.mtime() {
            changes.insert(ChangeKind::Time);
        }
        if src.mode() & 0o7777 != dst.mode() & 0o7777 {
            changes.insert(ChangeKind::Permissions);
        }
    }
    if src.uid() != dst.uid() {
        changes.insert(ChangeKind::Owner);
    }
    if src.gid() != dst.gid() {
        changes.insert(ChangeKind::Group);
    }
    if kind == ItemKind::Device && src.rdev() != dst.rdev() {
        changes.insert(ChangeKind::Checksum);
    }
}

fn compare_entry(src_path: &Path, src_meta: &Metadata, dst_path: &Path, rel: PathBuf) -> io::Result<DiffEntry> {
    let kind = kind_of(&src_meta.file_type());
    let dst_meta = match fs::symlink_metadata(dst_path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let update = if kind == ItemKind::File {
                UpdateType::Received
            } else {
                UpdateType::LocalChange
            };
            return Ok(DiffEntry::new(rel, kind, update).created());
        }
        Err(e) => return Err(e),
    };

    let mut changes = ChangeSet::empty();
    if kind_of(&dst_meta.file_type()) != kind {
        // Something of another type occupies the name.
        changes.insert(ChangeKind::Size);
        changes.insert(ChangeKind::Time);
    } else {
        attribute_changes(kind, src_meta, &dst_meta, &mut changes);
        if kind == ItemKind::Symlink && fs::read_link(src_path)? != fs::read_link(dst_path)? {
            changes.insert(ChangeKind::Checksum);
        }
    }

    let content = changes.contains(ChangeKind::Size)
        || changes.contains(ChangeKind::Time)
        || changes.contains(ChangeKind::Checksum);
    let update = match kind {
        ItemKind::File if content => UpdateType::Received,
        ItemKind::Symlink | ItemKind::Device if changes.contains(ChangeKind::Checksum) => {
            UpdateType::LocalChange
        }
        _ => UpdateType::Unchanged,
    };
    let mut entry = DiffEntry::new(rel, kind, update);
    entry.changes = changes;
    Ok(entry)
}

impl TreeDiffer for WalkDiffer {
    fn diff(&self, source: &Path, dest: &Path) -> Result<Vec<DiffItem>> {
        let mut items: Vec<DiffItem> = Vec::new();
        let mut content_checks: Vec<(usize, PathBuf, PathBuf)> = Vec::new();

        for res in WalkDir::new(source).follow_links(false).sort_by_file_name() {
            let entry = match res {
                Ok(e) => e,
                Err(e) => {
                    let raw = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    items.push(Err(MalformedEntry {
                        raw,
                        reason: format!("walk error: {e}"),
                    }));
                    continue;
                }
            };
            let src_path = entry.path();
            let rel = match src_path.strip_prefix(source) {
                Ok(r) if r.as_os_str().is_empty() => PathBuf::from("."),
                Ok(r) => r.to_path_buf(),
                Err(_) => {
                    items.push(Err(MalformedEntry {
                        raw: src_path.display().to_string(),
                        reason: "entry outside source root".into(),
                    }));
                    continue;
                }
            };
            let src_meta = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    items.push(Err(MalformedEntry {
                        raw: src_path.display().to_string(),
                        reason: format!("cannot stat source: {e}"),
                    }));
                    continue;
                }
            };
            let dst_path = dest.join(&rel);
            match compare_entry(src_path, &src_meta, &dst_path, rel) {
                Ok(diff) => {
                    if self.checksum
                        && diff.kind == ItemKind::File
                        && !diff.created
                        && !diff.changes.contains(ChangeKind::Size)
                    {
                        content_checks.push((items.len(), src_path.to_path_buf(), dst_path));
                    }
                    trace!(entry = %diff, "walk diff");
                    items.push(Ok(diff));
                }
                Err(e) => items.push(Err(MalformedEntry {
                    raw: src_path.display().to_string(),
                    reason: format!("cannot compare with destination: {e}"),
                })),
            }
        }

        if !content_checks.is_empty() {
            debug!(pairs = content_checks.len(), "comparing same-size file contents");
            let verdicts: Vec<(usize, io::Result<bool>)> = content_checks
                .par_iter()
                .map(|(idx, src, dst)| (*idx, files_identical(src, dst)))
                .collect();
            for (idx, verdict) in verdicts {
                match verdict {
                    Ok(true) => {}
                    Ok(false) => {
                        if let Some(Ok(diff)) = items.get_mut(idx) {
                            diff.changes.insert(ChangeKind::Checksum);
                            diff.update = UpdateType::Received;
                        }
                    }
                    Err(e) => {
                        let raw = content_checks
                            .iter()
                            .find(|(i, _, _)| *i == idx)
                            .map(|(_, s, _)| s.display().to_string())
                            .unwrap_or_default();
                        items[idx] = Err(MalformedEntry {
                            raw,
                            reason: format!("cannot compare contents: {e}"),
                        });
                    }
                }
            }
        }

        Ok(items)
    }
}
