//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - Every flag is optional; unset flags leave the config file value alone.
//! - --debug is a shorthand for --log-level debug.

use clap::{Parser, ValueHint};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::types::{Config, DifferKind, LogLevel};
use crate::migrate::DeconflictStyle;

/// CLI flags override config values (which are loaded from XML if present).
#[derive(Parser, Debug, Clone, Default)]
#[command(
    author,
    version,
    about = "Migrate a source tree into a destination tree without losing data"
)]
pub struct Args {
    /// Override the source base directory (normally configured via XML).
    #[arg(long, short = 's', value_hint = ValueHint::DirPath)]
    pub source: Option<PathBuf>,

    /// Override the destination base directory (normally configured via XML).
    #[arg(long, short = 'D', value_hint = ValueHint::DirPath)]
    pub dest: Option<PathBuf>,

    /// Minutes an empty source directory must sit untouched before it is removed.
    #[arg(long, value_name = "MINUTES")]
    pub stale_minutes: Option<u64>,

    /// Where the deconfliction token goes: append, before-last-dot, before-first-dot.
    #[arg(long, value_name = "STYLE")]
    pub deconflict_style: Option<DeconflictStyle>,

    /// File listing source directories that must never be removed.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub preserve_list: Option<PathBuf>,

    /// File of `owner:group<TAB>path` rules applied to the destination.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub ownership_list: Option<PathBuf>,

    /// How the tree difference is computed: walk or rsync.
    #[arg(long, value_name = "KIND")]
    pub differ: Option<DifferKind>,

    /// Compare file contents while diffing (slower).
    #[arg(long)]
    pub checksum: bool,

    /// Append-only audit log path.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub audit_log: Option<PathBuf>,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Set log level: quiet, normal, info, debug.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Also write logs to this file.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Run lock path.
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "no_lock")]
    pub lock_file: Option<PathBuf>,

    /// Skip the run lock (for filesystems where flock is unavailable).
    #[arg(long)]
    pub no_lock: bool,

    /// Show what would be done, but do not modify files/directories.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit logs in structured JSON.
    #[arg(long)]
    pub json: bool,

    /// Print the config file location used by tree_move and exit.
    #[arg(long)]
    pub print_config: bool,
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.clone()
    }

    /// Whether both bases were given on the command line.
    pub fn names_both_bases(&self) -> bool {
        self.source.is_some() && self.dest.is_some()
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(p) = &self.source {
            cfg.source_base = p.clone();
        }
        if let Some(p) = &self.dest {
            cfg.dest_base = p.clone();
        }
        if let Some(m) = self.stale_minutes {
            cfg.stale_after = Duration::from_secs(m.saturating_mul(60));
        }
        if let Some(style) = self.deconflict_style {
            cfg.deconflict_style = style;
        }
        if let Some(p) = &self.preserve_list {
            cfg.preserve_list = Some(p.clone());
        }
        if let Some(p) = &self.ownership_list {
            cfg.ownership_list = Some(p.clone());
        }
        if let Some(kind) = self.differ {
            cfg.differ = kind;
        }
        if self.checksum {
            cfg.checksum = true;
        }
        if let Some(p) = &self.audit_log {
            cfg.audit_log = Some(p.clone());
        }
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if let Some(p) = &self.log_file {
            cfg.log_file = Some(p.clone());
        }
        if let Some(p) = &self.lock_file {
            cfg.lock_file = Some(p.clone());
        }
        if self.no_lock {
            cfg.lock_file = None;
        }
        if self.dry_run {
            cfg.dry_run = true;
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
