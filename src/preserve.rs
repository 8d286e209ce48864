//! Preserved source directories.
//!
//! Directories listed here are never removed by the reaper, and metadata
//! variance on them is not treated as structural work. Membership is an exact
//! path match: preserving a parent does not protect its children.
//!
//! List format: one path per line; `#` comments and blank lines are skipped.
//! Relative entries are resolved against the source root.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Normalized, trailing-slash-terminated absolute directory paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreserveSet {
    entries: BTreeSet<String>,
}

/// Lexically resolve `.` and `..` components without touching the filesystem.
pub(crate) fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Absolute, symlink-resolved (when it exists), trailing-slash form of a directory path.
pub fn normalize_dir(path: &Path, base: &Path) -> String {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    let clean = lexical_clean(&joined);
    let resolved = dunce::canonicalize(&clean).unwrap_or(clean);
    let mut s = resolved.to_string_lossy().into_owned();
    if !s.ends_with('/') {
        s.push('/');
    }
    s
}

impl PreserveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from list text (comments and blanks skipped).
    pub fn parse(text: &str, source_root: &Path) -> Self {
        let entries = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|l| normalize_dir(Path::new(l), source_root))
            .collect();
        Self { entries }
    }

    pub fn load(path: &Path, source_root: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read preserve list '{}'", path.display()))?;
        Ok(Self::parse(&text, source_root))
    }

    pub fn insert(&mut self, path: &Path, source_root: &Path) {
        self.entries.insert(normalize_dir(path, source_root));
    }

    /// Exact membership test for a source directory.
    pub fn contains_dir(&self, path: &Path, source_root: &Path) -> bool {
        !self.entries.is_empty() && self.entries.contains(&normalize_dir(path, source_root))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn skips_comments_and_blank_lines() {
        let root = Path::new("/srv/photos");
        let set = PreserveSet::parse("# keep these\n\n  \n/srv/photos/2019-01-02\n", root);
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next(), Some("/srv/photos/2019-01-02/"));
    }

    #[test]
    fn relative_entries_resolve_against_source_root() {
        let root = Path::new("/srv/photos");
        let set = PreserveSet::parse("albums/./2019/../2020/\n", root);
        assert!(set.contains_dir(Path::new("/srv/photos/albums/2020"), root));
        assert!(set.contains_dir(Path::new("albums/2020/"), root));
    }

    #[test]
    fn membership_is_exact_not_prefix() {
        let root = Path::new("/srv/photos");
        let set = PreserveSet::parse("/srv/photos/keep\n", root);
        assert!(set.contains_dir(Path::new("/srv/photos/keep/"), root));
        assert!(!set.contains_dir(Path::new("/srv/photos/keep/child"), root));
        assert!(!set.contains_dir(Path::new("/srv/photos"), root));
    }

    #[test]
    fn symlinked_spelling_matches_real_directory() {
        let td = tempdir().unwrap();
        let real = td.path().join("real");
        fs::create_dir(&real).unwrap();
        let link = td.path().join("alias");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let set = PreserveSet::parse(&format!("{}\n", link.display()), td.path());
        assert!(set.contains_dir(&real, td.path()));
    }

    #[test]
    fn load_reads_file() {
        let td = tempdir().unwrap();
        let list = td.path().join("preserve.txt");
        fs::write(&list, "a\nb\n# c\n").unwrap();
        let set = PreserveSet::load(&list, Path::new("/root")).unwrap();
        assert_eq!(set.len(), 2);
        assert!(PreserveSet::load(&td.path().join("missing"), Path::new("/")).is_err());
    }
}
