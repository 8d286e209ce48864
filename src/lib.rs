//! Core library for `tree_move`.
//!
//! Migrates the contents of a source tree into a destination tree without ever
//! losing data: new files are moved, colliding files are moved under a
//! deconflicted name, and same-named files are deleted only when they are
//! byte-identical to the destination copy. Every action lands in an audit log.
//! After migrating, ownership rules are applied to the destination and stale
//! empty directories are reclaimed from the source.
//!
//! The binary (`src/main.rs`) wires configuration, logging and locking around
//! [`engine::run_cycle`]; everything it needs is reachable from here.

pub mod audit;
pub mod classify;
pub mod cli;
pub mod config;
pub mod context;
pub mod diff;
pub mod engine;
pub mod errors;
pub mod fs_ops;
pub mod migrate;
pub mod output;
pub mod ownership;
pub mod platform;
pub mod preserve;
pub mod reaper;
pub mod shutdown;

pub use audit::{Action, AuditSink, ErrorDetail, FileAuditLog, MemoryAuditLog, MigrationOutcome};
pub use classify::{ChangeBucket, Classified, DropReason, classify};
pub use config::{Config, ConfigLoad, DifferKind, LogLevel, load_config, path_has_symlink_ancestor};
pub use context::{Completion, RunContext};
pub use diff::{DiffEntry, DiffItem, ItemKind, RsyncDiffer, TreeDiffer, UpdateType, WalkDiffer};
pub use engine::{CycleOptions, RunSummary, run_cycle};
pub use errors::TreeMoveError;
pub use migrate::{CollisionResolver, DeconflictStyle, DuplicateVerifier, Migrator, Verdict};
pub use ownership::{OwnershipEnforcer, OwnershipRules};
pub use preserve::PreserveSet;
pub use reaper::StaleDirectoryReaper;
