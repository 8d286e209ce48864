//! Core configuration types.
//! - Config holds runtime settings with sensible defaults.
//! - LogLevel represents verbosity with simple parsing helpers.
//! - DifferKind selects how the tree difference is computed.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::paths;
use super::{DEST_BASE_DEFAULT, SOURCE_BASE_DEFAULT};
use crate::migrate::DeconflictStyle;

pub const DEFAULT_STALE_MINUTES: u64 = 15;

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Warnings and the run summary (default)
    #[default]
    Normal,
    /// Every applied action
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" | "warn" => Some(LogLevel::Normal),
            "info" | "verbose" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Which `TreeDiffer` computes the change list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DifferKind {
    /// Native walk of both trees.
    #[default]
    Walk,
    /// External `rsync --dry-run --itemize-changes`.
    Rsync,
}

impl fmt::Display for DifferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DifferKind::Walk => "walk",
            DifferKind::Rsync => "rsync",
        })
    }
}

impl FromStr for DifferKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "walk" | "native" => Ok(DifferKind::Walk),
            "rsync" => Ok(DifferKind::Rsync),
            other => Err(format!("invalid differ: '{other}' (expected walk or rsync)")),
        }
    }
}

/// Runtime configuration for one migration cycle.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tree files are migrated out of
    pub source_base: PathBuf,
    /// Tree files are migrated into (never created by us)
    pub dest_base: PathBuf,
    /// Idle time before an empty source directory may be removed
    pub stale_after: Duration,
    pub deconflict_style: DeconflictStyle,
    /// Optional list of source directories the reaper must keep
    pub preserve_list: Option<PathBuf>,
    /// Optional `owner:group<TAB>path` rules applied after migrations
    pub ownership_list: Option<PathBuf>,
    pub differ: DifferKind,
    /// Compare file contents in the differ (slower)
    pub checksum: bool,
    /// Append-only audit trail
    pub audit_log: Option<PathBuf>,
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
    /// Advisory run lock; None disables locking
    pub lock_file: Option<PathBuf>,
    /// If true, log planned actions but do not modify the filesystem
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_base: PathBuf::from(SOURCE_BASE_DEFAULT),
            dest_base: PathBuf::from(DEST_BASE_DEFAULT),
            stale_after: Duration::from_secs(DEFAULT_STALE_MINUTES * 60),
            deconflict_style: DeconflictStyle::default(),
            preserve_list: None,
            ownership_list: None,
            differ: DifferKind::default(),
            checksum: false,
            audit_log: paths::default_audit_path(),
            log_level: LogLevel::Normal,
            log_file: None,
            lock_file: paths::default_lock_path(),
            dry_run: false,
        }
    }
}

impl Config {
    /// Construct a Config with explicit bases; other fields use defaults.
    pub fn new(source_base: impl Into<PathBuf>, dest_base: impl Into<PathBuf>) -> Self {
        Self {
            source_base: source_base.into(),
            dest_base: dest_base.into(),
            ..Default::default()
        }
    }

    pub fn stale_minutes(&self) -> u64 {
        self.stale_after.as_secs() / 60
    }
}
