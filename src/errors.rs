//! Typed error definitions for tree_move.
//! These are the fatal conditions that stop a run before (or instead of) any
//! mutation. Per-item failures are never errors; they become audit outcomes.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TreeMoveError {
    #[error("Source base not found: {0}")]
    SourceMissing(PathBuf),

    #[error("Destination base not found: {0}")]
    DestMissing(PathBuf),

    #[error("{name} is not a directory: {path}")]
    NotADirectory { name: &'static str, path: PathBuf },

    #[error("Source and destination resolve to the same path: {0}")]
    SameRoot(PathBuf),

    #[error("'{inner}' must not be inside '{outer}'")]
    NestedRoots { inner: PathBuf, outer: PathBuf },

    #[error("Source '{source_base}' and destination '{dest_base}' are on different filesystems")]
    CrossDevice { source_base: PathBuf, dest_base: PathBuf },

    #[error("Another instance holds the run lock: {0}")]
    LockHeld(PathBuf),

    #[error("Tree differ failed (exit {code:?}): {stderr}")]
    Differ { code: Option<i32>, stderr: String },

    #[error("Run interrupted by user")]
    Interrupted,
}

impl TreeMoveError {
    /// Stable numeric code for structured logs.
    pub fn code(&self) -> u16 {
        match self {
            TreeMoveError::SourceMissing(_) => 10,
            TreeMoveError::DestMissing(_) => 11,
            TreeMoveError::NotADirectory { .. } => 12,
            TreeMoveError::SameRoot(_) => 13,
            TreeMoveError::NestedRoots { .. } => 14,
            TreeMoveError::CrossDevice { .. } => 15,
            TreeMoveError::LockHeld(_) => 20,
            TreeMoveError::Differ { .. } => 30,
            TreeMoveError::Interrupted => 130,
        }
    }
}
