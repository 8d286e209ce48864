//! Collision-free destination names.
//!
//! A deconflicted name embeds a nanosecond local timestamp next to the
//! original name:
//! - append (default): `report.csv` -> `report.csv-deconflicted-<ts>`
//! - before-last-dot:  `archive.tar.gz` -> `archive.tar-deconflicted-<ts>.gz`
//! - before-first-dot: `archive.tar.gz` -> `archive-deconflicted-<ts>.tar.gz`
//!
//! Notes:
//! - A leading dot (hidden file) is not a separator; with no usable dot the
//!   extension-aware styles fall back to append.
//! - A name that exists, or was already issued this run, gets `-<n>` after the
//!   timestamp (n = 2, 3, ...).
//! - Names are kept within 255 bytes by truncating the original stem.
//! - The name is only free at computation time; callers still move with the
//!   no-clobber primitive.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::trace;

pub const MARKER: &str = "-deconflicted-";
const MAX_FILENAME_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeconflictStyle {
    #[default]
    Append,
    BeforeLastDot,
    BeforeFirstDot,
}

impl DeconflictStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeconflictStyle::Append => "append",
            DeconflictStyle::BeforeLastDot => "before-last-dot",
            DeconflictStyle::BeforeFirstDot => "before-first-dot",
        }
    }
}

impl fmt::Display for DeconflictStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeconflictStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" | "append-suffix" | "suffix" => Ok(DeconflictStyle::Append),
            "before-last-dot" | "last-dot" => Ok(DeconflictStyle::BeforeLastDot),
            "before-first-dot" | "first-dot" => Ok(DeconflictStyle::BeforeFirstDot),
            other => Err(format!(
                "unknown deconflict style '{other}' (expected append, before-last-dot or before-first-dot)"
            )),
        }
    }
}

/// `YYYYmmdd-HHMMSS.nnnnnnnnn`
pub fn timestamp_token(now: DateTime<Local>) -> String {
    now.format("%Y%m%d-%H%M%S%.9f").to_string()
}

/// Byte offset where the marker is inserted, or None to append.
fn split_point(name: &[u8], style: DeconflictStyle) -> Option<usize> {
    match style {
        DeconflictStyle::Append => None,
        DeconflictStyle::BeforeLastDot => name.iter().rposition(|&b| b == b'.').filter(|&i| i > 0),
        DeconflictStyle::BeforeFirstDot => name
            .iter()
            .enumerate()
            .skip(1)
            .find(|&(_, &b)| b == b'.')
            .map(|(i, _)| i),
    }
}

/// Cut `stem` to at most `budget` bytes, on a char boundary when it is UTF-8.
fn truncate_stem(stem: &[u8], budget: usize) -> &[u8] {
    if stem.len() <= budget {
        return stem;
    }
    let mut cut = budget;
    if let Ok(s) = std::str::from_utf8(stem) {
        while cut > 0 && !s.is_char_boundary(cut) {
            cut -= 1;
        }
    }
    &stem[..cut]
}

/// Build the deconflicted form of `name` for a given token.
pub fn deconflicted_name(name: &OsStr, style: DeconflictStyle, token: &str) -> OsString {
    let bytes = name.as_bytes();
    let insert = format!("{MARKER}{token}");

    let (stem, tail) = match split_point(bytes, style) {
        Some(i) if insert.len() + (bytes.len() - i) < MAX_FILENAME_LEN => bytes.split_at(i),
        _ => (bytes, &[][..]),
    };
    let budget = MAX_FILENAME_LEN.saturating_sub(insert.len() + tail.len());
    let stem = truncate_stem(stem, budget);

    let mut out = Vec::with_capacity(stem.len() + insert.len() + tail.len());
    out.extend_from_slice(stem);
    out.extend_from_slice(insert.as_bytes());
    out.extend_from_slice(tail);
    OsString::from_vec(out)
}

/// Issues deconflicted destination paths, never the same one twice per run.
#[derive(Debug, Default)]
pub struct CollisionResolver {
    style: DeconflictStyle,
    issued: HashSet<PathBuf>,
}

impl CollisionResolver {
    pub fn new(style: DeconflictStyle) -> Self {
        Self {
            style,
            issued: HashSet::new(),
        }
    }

    /// Pick a free sibling name for the destination path `dest`.
    pub fn resolve(&mut self, dest: &Path) -> PathBuf {
        self.resolve_at(dest, Local::now())
    }

    pub(crate) fn resolve_at(&mut self, dest: &Path, now: DateTime<Local>) -> PathBuf {
        let parent = dest.parent().unwrap_or_else(|| Path::new(""));
        let name = dest.file_name().unwrap_or_else(|| OsStr::new("file"));
        let token = timestamp_token(now);

        let mut n: u64 = 1;
        loop {
            let tok = if n == 1 { token.clone() } else { format!("{token}-{n}") };
            let candidate = parent.join(deconflicted_name(name, self.style, &tok));
            let taken = self.issued.contains(&candidate) || fs::symlink_metadata(&candidate).is_ok();
            if !taken {
                trace!(dest = %dest.display(), candidate = %candidate.display(), attempts = n, "deconflicted name chosen");
                self.issued.insert(candidate.clone());
                return candidate;
            }
            n = n.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn fixed() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    fn name(s: &str, style: DeconflictStyle) -> String {
        deconflicted_name(OsStr::new(s), style, "TS").to_string_lossy().into_owned()
    }

    #[test]
    fn token_has_nanosecond_resolution() {
        assert_eq!(timestamp_token(fixed()), "20240309-070501.000000000");
    }

    #[test]
    fn styles() {
        assert_eq!(name("report.csv", DeconflictStyle::Append), "report.csv-deconflicted-TS");
        assert_eq!(
            name("archive.tar.gz", DeconflictStyle::BeforeLastDot),
            "archive.tar-deconflicted-TS.gz"
        );
        assert_eq!(
            name("archive.tar.gz", DeconflictStyle::BeforeFirstDot),
            "archive-deconflicted-TS.tar.gz"
        );
    }

    #[test]
    fn missing_separator_falls_back_to_append() {
        assert_eq!(name("README", DeconflictStyle::BeforeLastDot), "README-deconflicted-TS");
        assert_eq!(name(".bashrc", DeconflictStyle::BeforeLastDot), ".bashrc-deconflicted-TS");
        assert_eq!(name(".bashrc", DeconflictStyle::BeforeFirstDot), ".bashrc-deconflicted-TS");
        assert_eq!(
            name(".config.json", DeconflictStyle::BeforeFirstDot),
            ".config-deconflicted-TS.json"
        );
    }

    #[test]
    fn long_names_fit_the_filename_limit() {
        let long = format!("{}.mkv", "a".repeat(300));
        for style in [DeconflictStyle::Append, DeconflictStyle::BeforeLastDot] {
            let out = deconflicted_name(OsStr::new(&long), style, "20240309-070501.000000000");
            assert!(out.len() <= MAX_FILENAME_LEN, "{style}: {}", out.len());
            assert!(out.to_string_lossy().contains(MARKER));
        }
        let kept_ext = deconflicted_name(OsStr::new(&long), DeconflictStyle::BeforeLastDot, "TS");
        assert!(kept_ext.to_string_lossy().ends_with("-deconflicted-TS.mkv"));
    }

    #[test]
    fn multibyte_stems_truncate_on_char_boundary() {
        let long = "é".repeat(200);
        let out = deconflicted_name(OsStr::new(&long), DeconflictStyle::Append, "TS");
        assert!(out.to_str().is_some());
        assert!(out.len() <= MAX_FILENAME_LEN);
    }

    #[test]
    fn same_timestamp_never_yields_the_same_name_twice() {
        let td = tempdir().unwrap();
        let dest = td.path().join("report.csv");
        let mut r = CollisionResolver::new(DeconflictStyle::Append);
        let a = r.resolve_at(&dest, fixed());
        let b = r.resolve_at(&dest, fixed());
        assert_ne!(a, b);
        assert!(b.to_string_lossy().ends_with("-2"));
    }

    #[test]
    fn existing_names_are_skipped() {
        let td = tempdir().unwrap();
        let dest = td.path().join("report.csv");
        let taken = td
            .path()
            .join(deconflicted_name(OsStr::new("report.csv"), DeconflictStyle::Append, &timestamp_token(fixed())));
        fs::write(&taken, b"occupied").unwrap();
        let mut r = CollisionResolver::new(DeconflictStyle::Append);
        let got = r.resolve_at(&dest, fixed());
        assert_ne!(got, taken);
        assert!(!got.exists());
        assert_eq!(got.parent(), Some(td.path()));
    }

    #[test]
    fn parses_style_names() {
        assert_eq!("append".parse::<DeconflictStyle>().unwrap(), DeconflictStyle::Append);
        assert_eq!(
            "Before-Last-Dot".parse::<DeconflictStyle>().unwrap(),
            DeconflictStyle::BeforeLastDot
        );
        assert!("sideways".parse::<DeconflictStyle>().is_err());
    }
}
