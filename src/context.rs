//! Per-run state passed explicitly to every component.

use std::fmt::Display;
use tracing::{info, warn};

use crate::audit::{Action, AuditSink, MigrationOutcome};

/// Whether a component ran to the end or stopped on a shutdown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Finished,
    Interrupted,
}

/// Accumulators reset each run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub change_count: u64,
    /// Set by any successful migration; gates the ownership pass.
    pub ownership_changes: bool,
    pub warning_count: u64,
    pub dir_cleanup_count: u64,
    pub rules_applied: u64,
}

pub struct RunContext<'a> {
    pub counters: Counters,
    audit: &'a dyn AuditSink,
    dry_run: bool,
}

impl<'a> RunContext<'a> {
    pub fn new(audit: &'a dyn AuditSink, dry_run: bool) -> Self {
        Self {
            counters: Counters::default(),
            audit,
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Count, log and audit one outcome. Returns whether it succeeded.
    pub fn record(&mut self, outcome: MigrationOutcome) -> bool {
        let ok = outcome.is_success();
        if ok {
            match outcome.action {
                Action::Replicate
                | Action::Move
                | Action::MoveDeconflicted
                | Action::DeleteDuplicate
                | Action::PreserveDistinct => {
                    self.counters.change_count += 1;
                    self.counters.ownership_changes = true;
                }
                Action::RemoveDir => {
                    self.counters.change_count += 1;
                    self.counters.dir_cleanup_count += 1;
                }
                Action::Chown => self.counters.rules_applied += 1,
            }
        } else {
            self.counters.warning_count += 1;
        }

        if self.dry_run {
            info!(
                action = %outcome.action,
                bits = %outcome.bits,
                src = %outcome.source.display(),
                dest = %outcome.dest.display(),
                "dry-run: would apply"
            );
            return ok;
        }

        match &outcome.error {
            None => info!(
                action = %outcome.action,
                bits = %outcome.bits,
                src = %outcome.source.display(),
                dest = %outcome.dest.display(),
                "applied"
            ),
            Some(err) => warn!(
                action = %outcome.action,
                bits = %outcome.bits,
                src = %outcome.source.display(),
                dest = %outcome.dest.display(),
                error = %err,
                "action failed"
            ),
        }

        if let Err(e) = self.audit.record(&outcome) {
            self.counters.warning_count += 1;
            warn!(error = %e, "failed to write audit record");
        }
        ok
    }

    /// Count a warning that has no audit record of its own (malformed input, bad rule).
    pub fn warn(&mut self, message: impl Display) {
        self.counters.warning_count += 1;
        warn!("{}", message);
    }
}
