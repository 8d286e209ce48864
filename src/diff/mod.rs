//! Tree-difference model.
//!
//! A `TreeDiffer` compares the source tree against the destination tree and
//! reports one record per differing (or, for files, merely same-named) entry.
//! Records are typed: the classifier never looks at a diff tool's text output.
//!
//! Implementations:
//! - `WalkDiffer`: native walk of both trees (default).
//! - `RsyncDiffer`: delegates to `rsync -n -ii` and parses its itemized output.
//! - `parse_itemized`: parser for itemized text obtained elsewhere.

mod itemize;
mod rsync;
mod walk;

pub use itemize::{parse_itemized, parse_itemized_bytes, parse_itemized_line};
pub use rsync::RsyncDiffer;
pub use walk::WalkDiffer;

use anyhow::Result;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// What kind of filesystem object an entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    File,
    Dir,
    Symlink,
    /// Block or character device.
    Device,
    /// FIFO or socket.
    Special,
}

impl ItemKind {
    pub fn as_char(self) -> char {
        match self {
            ItemKind::File => 'f',
            ItemKind::Dir => 'd',
            ItemKind::Symlink => 'L',
            ItemKind::Device => 'D',
            ItemKind::Special => 'S',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'f' => Some(ItemKind::File),
            'd' => Some(ItemKind::Dir),
            'L' => Some(ItemKind::Symlink),
            'D' => Some(ItemKind::Device),
            'S' => Some(ItemKind::Special),
            _ => None,
        }
    }
}

/// How the entry would be brought up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateType {
    Sent,
    /// Content would be transferred into the destination.
    Received,
    /// Created or changed locally without a content transfer (dirs, links, devices).
    LocalChange,
    HardLink,
    /// No transfer; attributes may still differ.
    Unchanged,
    /// Informational record (e.g. `*deleting`), not an item to act on.
    Message,
}

impl UpdateType {
    pub fn as_char(self) -> char {
        match self {
            UpdateType::Sent => '<',
            UpdateType::Received => '>',
            UpdateType::LocalChange => 'c',
            UpdateType::HardLink => 'h',
            UpdateType::Unchanged => '.',
            UpdateType::Message => '*',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '<' => Some(UpdateType::Sent),
            '>' => Some(UpdateType::Received),
            'c' => Some(UpdateType::LocalChange),
            'h' => Some(UpdateType::HardLink),
            '.' => Some(UpdateType::Unchanged),
            '*' => Some(UpdateType::Message),
            _ => None,
        }
    }
}

/// A single attribute difference between source and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Checksum,
    Size,
    Time,
    Permissions,
    Owner,
    Group,
    UnnamedAttr,
    Acl,
    ExtendedAttr,
}

impl ChangeKind {
    /// Itemize column order: `c s t p o g u a x`.
    pub const ALL: [ChangeKind; 9] = [
        ChangeKind::Checksum,
        ChangeKind::Size,
        ChangeKind::Time,
        ChangeKind::Permissions,
        ChangeKind::Owner,
        ChangeKind::Group,
        ChangeKind::UnnamedAttr,
        ChangeKind::Acl,
        ChangeKind::ExtendedAttr,
    ];

    fn bit(self) -> u16 {
        1 << (self as u16)
    }

    pub(crate) fn column_char(self) -> char {
        match self {
            ChangeKind::Checksum => 'c',
            ChangeKind::Size => 's',
            ChangeKind::Time => 't',
            ChangeKind::Permissions => 'p',
            ChangeKind::Owner => 'o',
            ChangeKind::Group => 'g',
            ChangeKind::UnnamedAttr => 'u',
            ChangeKind::Acl => 'a',
            ChangeKind::ExtendedAttr => 'x',
        }
    }
}

/// Compact set of `ChangeKind`s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ChangeSet(u16);

impl ChangeSet {
    pub fn empty() -> Self {
        ChangeSet(0)
    }

    pub fn of(kinds: &[ChangeKind]) -> Self {
        let mut set = ChangeSet::empty();
        for k in kinds {
            set.insert(*k);
        }
        set
    }

    pub fn insert(&mut self, kind: ChangeKind) {
        self.0 |= kind.bit();
    }

    pub fn contains(&self, kind: ChangeKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = ChangeKind> + '_ {
        ChangeKind::ALL.into_iter().filter(|k| self.contains(*k))
    }
}

/// One record produced by a `TreeDiffer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    /// Path relative to both tree roots. The root itself is `"."`.
    pub rel_path: PathBuf,
    pub kind: ItemKind,
    pub update: UpdateType,
    pub changes: ChangeSet,
    /// The destination has no counterpart at `rel_path`.
    pub created: bool,
}

impl DiffEntry {
    pub fn new(rel_path: impl Into<PathBuf>, kind: ItemKind, update: UpdateType) -> Self {
        Self {
            rel_path: rel_path.into(),
            kind,
            update,
            changes: ChangeSet::empty(),
            created: false,
        }
    }

    pub fn with_changes(mut self, kinds: &[ChangeKind]) -> Self {
        for k in kinds {
            self.changes.insert(*k);
        }
        self
    }

    pub fn created(mut self) -> Self {
        self.created = true;
        self
    }

    pub fn is_root(&self) -> bool {
        self.rel_path.as_os_str().is_empty() || self.rel_path == Path::new(".")
    }

    /// Canonical 11-character itemize string (`YXcstpoguax`).
    pub fn bits(&self) -> String {
        let mut s = String::with_capacity(11);
        s.push(self.update.as_char());
        s.push(self.kind.as_char());
        for k in ChangeKind::ALL {
            if self.created {
                s.push('+');
            } else if self.changes.contains(k) {
                s.push(k.column_char());
            } else if self.update == UpdateType::Unchanged && self.changes.is_empty() {
                s.push(' ');
            } else {
                s.push('.');
            }
        }
        s
    }
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.bits(), self.rel_path.display())
    }
}

/// A record the differ could not turn into a `DiffEntry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedEntry {
    pub raw: String,
    pub reason: String,
}

impl fmt::Display for MalformedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.reason, self.raw)
    }
}

pub type DiffItem = std::result::Result<DiffEntry, MalformedEntry>;

/// Produces the list of differences between a source and destination tree.
pub trait TreeDiffer {
    fn diff(&self, source: &Path, dest: &Path) -> Result<Vec<DiffItem>>;
}

/// Reject paths that would escape the tree roots.
pub(crate) fn validate_rel_path(path: &Path) -> std::result::Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err("empty path".into());
    }
    for comp in path.components() {
        match comp {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err("path escapes the tree root".into()),
            Component::RootDir | Component::Prefix(_) => {
                return Err("path is absolute".into());
            }
        }
    }
    Ok(())
}
