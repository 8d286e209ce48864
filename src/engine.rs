//! One migration cycle: diff, classify, migrate, enforce ownership, reap.
//!
//! Only a differ failure is fatal here; everything after classification
//! reports per-item outcomes through the `RunContext`.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::audit::AuditSink;
use crate::classify::{ChangeBucket, DropReason, classify};
use crate::config::Config;
use crate::context::{Completion, RunContext};
use crate::diff::TreeDiffer;
use crate::migrate::{DeconflictStyle, Migrator};
use crate::ownership::{OwnershipEnforcer, OwnershipRules};
use crate::preserve::PreserveSet;
use crate::reaper::StaleDirectoryReaper;

/// Inputs of a cycle that come from configuration.
#[derive(Debug, Clone)]
pub struct CycleOptions<'a> {
    pub source_base: &'a Path,
    pub dest_base: &'a Path,
    pub stale_after: Duration,
    pub deconflict_style: DeconflictStyle,
    pub dry_run: bool,
}

impl<'a> From<&'a Config> for CycleOptions<'a> {
    fn from(cfg: &'a Config) -> Self {
        Self {
            source_base: &cfg.source_base,
            dest_base: &cfg.dest_base,
            stale_after: cfg.stale_after,
            deconflict_style: cfg.deconflict_style,
            dry_run: cfg.dry_run,
        }
    }
}

/// End-of-run totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub changes: u64,
    pub warnings: u64,
    pub dirs_removed: u64,
    pub ownership_applied: u64,
    pub malformed: usize,
    pub dropped: BTreeMap<DropReason, usize>,
    pub buckets: BTreeMap<ChangeBucket, usize>,
    pub dry_run: bool,
    pub interrupted: bool,
}

/// Run one full cycle against already-validated roots.
pub fn run_cycle(
    opts: &CycleOptions<'_>,
    differ: &dyn TreeDiffer,
    preserve: &PreserveSet,
    rules: &OwnershipRules,
    audit: &dyn AuditSink,
) -> Result<RunSummary> {
    let mut ctx = RunContext::new(audit, opts.dry_run);
    for rejected in rules.rejected() {
        ctx.warn(format_args!("ownership rules: {}", rejected));
    }

    let items = differ
        .diff(opts.source_base, opts.dest_base)
        .context("compute tree difference")?;
    debug!(records = items.len(), "diff complete");

    let classified = classify(items, preserve, opts.source_base, &mut ctx);
    let mut summary = RunSummary {
        malformed: classified.malformed,
        dry_run: opts.dry_run,
        ..Default::default()
    };
    for reason in DropReason::ALL {
        summary.dropped.insert(reason, classified.dropped(reason));
    }
    for bucket in ChangeBucket::ALL {
        summary.buckets.insert(bucket, classified.bucket_len(bucket));
    }

    let mut migrator = Migrator::new(opts.source_base, opts.dest_base, opts.deconflict_style);
    let mut completion = migrator.run(&classified, &mut ctx);

    if completion == Completion::Finished {
        completion = OwnershipEnforcer::new(opts.dest_base, rules).run(&mut ctx);
    }
    if completion == Completion::Finished {
        completion = StaleDirectoryReaper::new(opts.source_base, opts.stale_after, preserve).run(&mut ctx);
    }

    let c = ctx.counters;
    summary.changes = c.change_count;
    summary.warnings = c.warning_count;
    summary.dirs_removed = c.dir_cleanup_count;
    summary.ownership_applied = c.rules_applied;
    summary.interrupted = completion == Completion::Interrupted;

    info!(
        changes = summary.changes,
        warnings = summary.warnings,
        dirs_removed = summary.dirs_removed,
        ownership_applied = summary.ownership_applied,
        dry_run = summary.dry_run,
        interrupted = summary.interrupted,
        "cycle complete"
    );
    Ok(summary)
}
