//! Append-only audit trail.
//!
//! Every attempted action produces one `MigrationOutcome`; sinks render it as a
//! single tab-separated, timestamp-prefixed line:
//!
//! ```text
//! 2024-05-01 10:00:00	>f+++++++++	"/src/a.jpg"	"/dst/a.jpg"	move
//! 2024-05-01 10:00:00	WARNING	>f.st......	"/src/b"	"/dst/b"	move failed: ... (code 17)
//! ```
//!
//! Writes are serialized through a `Mutex`, so a sink can be shared by
//! components running on different threads.

use anyhow::{Context, Result};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::fs_ops::{build_message, io_error_with_help};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Bits column used for directory removals (mirrors rsync's deletion record).
pub const REMOVE_DIR_BITS: &str = "*deleting";

/// What an outcome did (or tried to do).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Structural item created or its attributes reconciled.
    Replicate,
    /// New file moved to the identical relative path.
    Move,
    /// Colliding file moved under a deconflicted name.
    MoveDeconflicted,
    /// Verified byte-identical source copy deleted.
    DeleteDuplicate,
    /// Same-name file whose content differed, moved under a deconflicted name.
    PreserveDistinct,
    /// Stale empty source directory removed.
    RemoveDir,
    /// Ownership rule applied under the destination root.
    Chown,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Replicate => "replicate",
            Action::Move => "move",
            Action::MoveDeconflicted => "move-deconflicted",
            Action::DeleteDuplicate => "delete-duplicate",
            Action::PreserveDistinct => "preserve-distinct",
            Action::RemoveDir => "remove-dir",
            Action::Chown => "chown",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure detail: raw OS error code (when there is one) plus a hint-enriched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    pub code: Option<i32>,
    pub message: String,
}

impl ErrorDetail {
    pub fn from_io(op: &str, path: &Path, e: &io::Error) -> Self {
        Self {
            code: e.raw_os_error(),
            message: build_message(op, path, e),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

/// One attempted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub action: Action,
    pub bits: String,
    pub source: PathBuf,
    pub dest: PathBuf,
    pub error: Option<ErrorDetail>,
}

impl MigrationOutcome {
    pub fn succeeded(action: Action, bits: impl Into<String>, source: &Path, dest: &Path) -> Self {
        Self {
            action,
            bits: bits.into(),
            source: source.to_path_buf(),
            dest: dest.to_path_buf(),
            error: None,
        }
    }

    pub fn failed(
        action: Action,
        bits: impl Into<String>,
        source: &Path,
        dest: &Path,
        error: ErrorDetail,
    ) -> Self {
        Self {
            action,
            bits: bits.into(),
            source: source.to_path_buf(),
            dest: dest.to_path_buf(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Render the audit line body (everything after the timestamp).
    pub fn render(&self) -> String {
        match &self.error {
            None => format!(
                "{}\t\"{}\"\t\"{}\"\t{}",
                self.bits,
                self.source.display(),
                self.dest.display(),
                self.action
            ),
            Some(err) => format!(
                "WARNING\t{}\t\"{}\"\t\"{}\"\t{} failed: {}",
                self.bits,
                self.source.display(),
                self.dest.display(),
                self.action,
                err
            ),
        }
    }
}

fn timestamped(outcome: &MigrationOutcome) -> String {
    format!(
        "{}\t{}",
        chrono::Local::now().format(TIMESTAMP_FORMAT),
        outcome.render()
    )
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, outcome: &MigrationOutcome) -> io::Result<()>;
}

/// Appends audit lines to a file created with mode 0600.
pub struct FileAuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileAuditLog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create audit log directory '{}'", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o600)
            .open(path)
            .map_err(io_error_with_help("open audit log", path))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditLog {
    fn record(&self, outcome: &MigrationOutcome) -> io::Result<()> {
        let line = timestamped(outcome);
        let mut f = self.file.lock().unwrap_or_else(|p| p.into_inner());
        writeln!(f, "{}", line)
    }
}

/// Keeps audit lines in memory.
#[derive(Default)]
pub struct MemoryAuditLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, outcome: &MigrationOutcome) -> io::Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(timestamped(outcome));
        Ok(())
    }
}
