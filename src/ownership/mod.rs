//! Ownership enforcement on the destination tree.
//!
//! Runs only when at least one migration succeeded. Rules apply in file order:
//! - a target that is missing or not a directory is skipped silently;
//! - relative targets are taken relative to the destination root;
//! - symlinks are resolved on both the target and the destination root, and a
//!   target that does not resolve under the root is skipped silently;
//! - the walk never follows symlinks and uses `lchown`, so links are re-owned
//!   themselves and never redirect the rule elsewhere.

mod ids;
mod rules;

pub use ids::{OwnerIds, resolve_owner_spec};
pub use rules::{OwnershipRule, OwnershipRules};

use std::fs;
use std::io;
use std::os::unix::fs::lchown;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::audit::{Action, ErrorDetail, MigrationOutcome};
use crate::context::{Completion, RunContext};
use crate::shutdown;

pub struct OwnershipEnforcer<'a> {
    dest_root: &'a Path,
    rules: &'a OwnershipRules,
}

impl<'a> OwnershipEnforcer<'a> {
    pub fn new(dest_root: &'a Path, rules: &'a OwnershipRules) -> Self {
        Self { dest_root, rules }
    }

    /// Resolved target inside `root`, or None when the rule does not apply.
    pub fn resolve_target(&self, rule: &OwnershipRule, root: &Path) -> Option<PathBuf> {
        let target = if rule.target.is_absolute() {
            rule.target.clone()
        } else {
            self.dest_root.join(&rule.target)
        };
        match fs::metadata(&target) {
            Ok(m) if m.is_dir() => {}
            _ => {
                debug!(target = %target.display(), line = rule.line, "ownership target missing or not a directory; skipped");
                return None;
            }
        }
        let resolved = dunce::canonicalize(&target).ok()?;
        if !resolved.starts_with(root) {
            debug!(target = %target.display(), resolved = %resolved.display(), "ownership target outside destination root; skipped");
            return None;
        }
        Some(resolved)
    }

    /// Apply `ids` below `path` without following symlinks.
    fn apply_tree(path: &Path, ids: OwnerIds) -> (u64, u64, Option<ErrorDetail>) {
        let mut applied = 0u64;
        let mut failed = 0u64;
        let mut first: Option<ErrorDetail> = None;
        for res in WalkDir::new(path).follow_links(false) {
            let result = match res {
                Ok(entry) => lchown(entry.path(), ids.uid, ids.gid)
                    .map_err(|e| ErrorDetail::from_io("chown", entry.path(), &e)),
                Err(e) => {
                    let at = e.path().map(Path::to_path_buf).unwrap_or_else(|| path.to_path_buf());
                    let io_err = e
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::other("filesystem loop"));
                    Err(ErrorDetail::from_io("walk", &at, &io_err))
                }
            };
            match result {
                Ok(()) => applied += 1,
                Err(detail) => {
                    failed += 1;
                    first.get_or_insert(detail);
                }
            }
        }
        (applied, failed, first)
    }

    /// Apply one rule and return its outcome, or None when the rule was skipped.
    pub fn apply_rule(&self, rule: &OwnershipRule, root: &Path, dry_run: bool) -> Option<MigrationOutcome> {
        let resolved = self.resolve_target(rule, root)?;
        let ids = match resolve_owner_spec(&rule.spec) {
            Ok(ids) => ids,
            Err(msg) => {
                return Some(MigrationOutcome::failed(
                    Action::Chown,
                    rule.spec.as_str(),
                    &rule.target,
                    &resolved,
                    ErrorDetail::message(format!("line {}: {}", rule.line, msg)),
                ));
            }
        };
        if dry_run {
            return Some(MigrationOutcome::succeeded(Action::Chown, rule.spec.as_str(), &rule.target, &resolved));
        }

        let (applied, failed, first) = Self::apply_tree(&resolved, ids);
        debug!(target = %resolved.display(), applied, failed, "ownership rule applied");
        Some(match first {
            None => MigrationOutcome::succeeded(Action::Chown, rule.spec.as_str(), &rule.target, &resolved),
            Some(detail) => {
                let detail = ErrorDetail {
                    code: detail.code,
                    message: format!("{failed} of {} entries failed; first: {}", applied + failed, detail.message),
                };
                MigrationOutcome::failed(Action::Chown, rule.spec.as_str(), &rule.target, &resolved, detail)
            }
        })
    }

    pub fn run(&self, ctx: &mut RunContext<'_>) -> Completion {
        if !ctx.counters.ownership_changes {
            debug!("no successful migrations; ownership pass skipped");
            return Completion::Finished;
        }
        if self.rules.is_empty() {
            return Completion::Finished;
        }
        let root = match dunce::canonicalize(self.dest_root) {
            Ok(r) => r,
            Err(e) => {
                ctx.warn(format_args!(
                    "ownership: cannot resolve destination root '{}': {}",
                    self.dest_root.display(),
                    e
                ));
                return Completion::Finished;
            }
        };
        for rule in self.rules.rules() {
            if shutdown::is_requested() {
                debug!("shutdown requested; stopping ownership pass");
                return Completion::Interrupted;
            }
            if let Some(outcome) = self.apply_rule(rule, &root, ctx.is_dry_run()) {
                ctx.record(outcome);
            }
        }
        Completion::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use tempfile::tempdir;

    fn own_ids() -> String {
        let uid = unsafe { libc::geteuid() };
        let gid = unsafe { libc::getegid() };
        format!("{uid}:{gid}")
    }

    #[test]
    fn skips_targets_outside_the_root() {
        let td = tempdir().unwrap();
        let dest = td.path().join("dest");
        let outside = td.path().join("outside");
        fs::create_dir(&dest).unwrap();
        fs::create_dir(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, dest.join("escape")).unwrap();

        let mut rules = OwnershipRules::new();
        rules.push(own_ids(), outside.clone());
        rules.push(own_ids(), "escape");
        let e = OwnershipEnforcer::new(&dest, &rules);
        let root = dunce::canonicalize(&dest).unwrap();
        for rule in rules.rules() {
            assert!(e.apply_rule(rule, &root, false).is_none());
        }
    }

    #[test]
    fn skips_missing_and_non_directory_targets() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("file"), b"x").unwrap();
        let mut rules = OwnershipRules::new();
        rules.push(own_ids(), "file");
        rules.push(own_ids(), "missing");
        let e = OwnershipEnforcer::new(td.path(), &rules);
        let root = dunce::canonicalize(td.path()).unwrap();
        for rule in rules.rules() {
            assert!(e.apply_rule(rule, &root, false).is_none());
        }
    }

    #[test]
    fn applies_inside_root_without_following_links() {
        let td = tempdir().unwrap();
        let dest = td.path().join("dest");
        fs::create_dir_all(dest.join("albums/2019")).unwrap();
        fs::write(dest.join("albums/2019/a.jpg"), b"jpg").unwrap();
        std::os::unix::fs::symlink("/", dest.join("albums/root-link")).unwrap();

        let mut rules = OwnershipRules::new();
        rules.push(own_ids(), "albums");
        let e = OwnershipEnforcer::new(&dest, &rules);
        let sink = MemoryAuditLog::new();
        let mut ctx = RunContext::new(&sink, false);
        ctx.counters.ownership_changes = true;

        assert_eq!(e.run(&mut ctx), Completion::Finished);
        assert_eq!(ctx.counters.rules_applied, 1);
        assert_eq!(ctx.counters.warning_count, 0);
        assert!(sink.lines()[0].ends_with("\tchown"));
    }

    #[test]
    fn bad_spec_is_a_warning() {
        let td = tempdir().unwrap();
        let mut rules = OwnershipRules::new();
        rules.push("no-such-user-tree-move:", ".");
        let e = OwnershipEnforcer::new(td.path(), &rules);
        let sink = MemoryAuditLog::new();
        let mut ctx = RunContext::new(&sink, false);
        ctx.counters.ownership_changes = true;
        e.run(&mut ctx);
        assert_eq!(ctx.counters.warning_count, 1);
        assert_eq!(ctx.counters.rules_applied, 0);
    }

    #[test]
    fn gated_on_successful_migrations() {
        let td = tempdir().unwrap();
        let mut rules = OwnershipRules::new();
        rules.push("no-such-user-tree-move:", ".");
        let e = OwnershipEnforcer::new(td.path(), &rules);
        let sink = MemoryAuditLog::new();
        let mut ctx = RunContext::new(&sink, false);
        e.run(&mut ctx);
        assert_eq!(ctx.counters.warning_count, 0);
        assert!(sink.lines().is_empty());
    }
}
