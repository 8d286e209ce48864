//! Application orchestrator.
//! Loads/merges config, initializes logging, installs signal handlers, takes the
//! run lock, validates the bases and runs one migration cycle.

use anyhow::Result;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use tree_move::cli::Args;
use tree_move::config::paths::env_config_path;
use tree_move::fs_ops::try_acquire_run_lock;
use tree_move::output as out;
use tree_move::{
    AuditSink, Config, ConfigLoad, CycleOptions, DifferKind, FileAuditLog, MemoryAuditLog, OwnershipRules,
    PreserveSet, RsyncDiffer, TreeDiffer, TreeMoveError, WalkDiffer, load_config, run_cycle, shutdown,
};

use crate::logging::init_tracing;

/// Run the CLI application.
pub fn run(args: Args) -> Result<()> {
    // Handle --print-config before logging init
    if args.print_config {
        print_config_location();
        return Ok(());
    }

    let (mut cfg, template) = match load_config()? {
        ConfigLoad::Loaded { config, .. } => (config, None),
        ConfigLoad::TemplateCreated(path) => (Config::default(), Some(path)),
        ConfigLoad::Defaults => (Config::default(), None),
    };
    args.apply_overrides(&mut cfg);

    if let Some(path) = template
        && !args.names_both_bases()
    {
        out::print_success(&format!("A template tree_move config was written to: {}", path.display()));
        out::print_info("Edit `source_base` and `dest_base` (and optionally the preserve and ownership lists), then re-run.");
        out::print_info("To use a different location set TREE_MOVE_CONFIG.");
        return Ok(());
    }

    // Initialize logging and capture the guard so we can drop it on signal
    let guard_opt = init_tracing(&cfg.log_level, cfg.log_file.as_deref(), args.json).map_err(|e| {
        out::print_error(&format!("Failed to initialize logging: {}", e));
        e
    })?;

    let guard_slot = Arc::new(Mutex::new(guard_opt));
    {
        let guard_slot = Arc::clone(&guard_slot);
        ctrlc::set_handler(move || {
            shutdown::request();
            out::print_warn("Received interrupt; finishing the current item and stopping...");
            if let Ok(mut g) = guard_slot.lock() {
                let _ = g.take(); // drop guard here to flush tracing_appender
            }
        })
        .expect("failed to install signal handler");
    }

    debug!("Starting tree_move: {:?}", args);

    let result = run_locked(&mut cfg);

    // Ensure logs are flushed before exit
    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }

    result
}

fn print_config_location() {
    if let Some(p) = env_config_path() {
        out::print_info(&format!("Using TREE_MOVE_CONFIG (explicit):\n  {}\n", p.display()));
        out::print_info("To override, unset TREE_MOVE_CONFIG or set it to another file.");
        return;
    }
    match tree_move::config::default_config_path() {
        Some(p) => {
            out::print_info(&format!("Default tree_move config path:\n  {}\n", p.display()));
            if p.exists() {
                out::print_info("A config file already exists at that location.");
            } else {
                out::print_info("No config file exists there yet. Run without --print-config to create a template.");
            }
        }
        None => out::print_error("Could not determine a default config path"),
    }
}

fn run_locked(cfg: &mut Config) -> Result<()> {
    let _lock = match cfg.lock_file.as_deref() {
        Some(path) => match try_acquire_run_lock(path)? {
            Some(lock) => {
                debug!(lock = %lock.path().display(), "run lock acquired");
                Some(lock)
            }
            None => {
                let held = TreeMoveError::LockHeld(path.to_path_buf());
                info!(code = held.code(), lock = %path.display(), "another instance is running; nothing to do");
                out::print_info(&held.to_string());
                return Ok(());
            }
        },
        None => {
            debug!("run lock disabled");
            None
        }
    };

    if let Err(e) = cfg.validate_and_normalize() {
        if let Some(tm) = e.downcast_ref::<TreeMoveError>() {
            error!(code = tm.code(), error = %tm, "configuration rejected");
        } else {
            error!(error = %e, "configuration rejected");
        }
        return Err(e);
    }

    let differ: Box<dyn TreeDiffer> = match cfg.differ {
        DifferKind::Walk => Box::new(WalkDiffer::new(cfg.checksum)),
        DifferKind::Rsync => Box::new(RsyncDiffer::new(cfg.checksum)),
    };

    let preserve = match cfg.preserve_list.as_deref() {
        Some(path) => load_optional(path, "preserve list", |p| PreserveSet::load(p, &cfg.source_base)),
        None => PreserveSet::new(),
    };
    let rules = match cfg.ownership_list.as_deref() {
        Some(path) => load_optional(path, "ownership rules", OwnershipRules::load),
        None => OwnershipRules::new(),
    };
    debug!(preserved = preserve.len(), rules = rules.rules().len(), "lists loaded");

    // Dry runs never write the audit trail, so nothing is opened on disk for them.
    let audit: Box<dyn AuditSink> = match cfg.audit_log.as_deref() {
        Some(path) if !cfg.dry_run => Box::new(FileAuditLog::open(path)?),
        Some(_) => Box::new(MemoryAuditLog::new()),
        None => {
            warn!("no audit log configured; actions are only logged");
            Box::new(MemoryAuditLog::new())
        }
    };

    let summary = run_cycle(&CycleOptions::from(&*cfg), differ.as_ref(), &preserve, &rules, audit.as_ref())?;
    out::print_summary(&summary);

    if summary.interrupted {
        let e = TreeMoveError::Interrupted;
        error!(code = e.code(), "run aborted by user");
        return Err(e.into());
    }
    Ok(())
}

/// Missing or unreadable optional lists degrade to an empty list with a warning.
fn load_optional<T: Default>(path: &Path, what: &str, load: impl FnOnce(&Path) -> Result<T>) -> T {
    if !path.exists() {
        warn!(path = %path.display(), "{what} not found; continuing without it");
        return T::default();
    }
    load(path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %format!("{e:#}"), "{what} unreadable; continuing without it");
        T::default()
    })
}
