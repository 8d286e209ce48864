//! XML configuration support.
//! - Loads settings from config.xml (quick_xml + serde).
//! - Creates a secure template if the default file is missing (never for TREE_MOVE_CONFIG).
//!
//! Notes:
//! - This module only reads/writes the config file; directory validation happens elsewhere.
//! - Unknown XML fields and invalid values are errors so misconfigurations surface early.

use anyhow::{Context, Result, anyhow, bail};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::paths::{self, default_audit_path, default_lock_path, path_has_symlink_ancestor};
use super::types::{Config, DEFAULT_STALE_MINUTES, DifferKind, LogLevel};
use super::{DEST_BASE_DEFAULT, SOURCE_BASE_DEFAULT};
use crate::migrate::DeconflictStyle;
use crate::platform::{set_dir_mode_0700, set_file_mode_0600, write_config_secure_new_0600};

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    source_base: Option<String>,
    dest_base: Option<String>,
    #[serde(default, deserialize_with = "de_u64_trimmed_opt")]
    stale_minutes: Option<u64>,
    deconflict_style: Option<String>,
    preserve_list: Option<String>,
    ownership_list: Option<String>,
    differ: Option<String>,
    #[serde(default, deserialize_with = "de_bool_trimmed_opt")]
    checksum: Option<bool>,
    audit_log: Option<String>,
    log_level: Option<String>,
    log_file: Option<String>,
    lock_file: Option<String>,
    #[serde(default, deserialize_with = "de_bool_trimmed_opt")]
    dry_run: Option<bool>,
}

// Trim surrounding whitespace for an optional u64; an empty element means "unset".
fn de_u64_trimmed_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<u64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected a non-negative integer, got '{s}'"))),
    }
}

fn de_bool_trimmed_opt<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(|s| s.trim().to_ascii_lowercase()) {
        None => Ok(None),
        Some(s) => match s.as_str() {
            "" => Ok(None),
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!("expected true/false, got '{other}'"))),
        },
    }
}

fn non_empty_path(s: Option<&str>) -> Option<PathBuf> {
    s.map(str::trim).filter(|t| !t.is_empty()).map(PathBuf::from)
}

// Map XmlConfig -> Config
fn xml_to_config(parsed: XmlConfig) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(p) = non_empty_path(parsed.source_base.as_deref()) {
        cfg.source_base = p;
    }
    if let Some(p) = non_empty_path(parsed.dest_base.as_deref()) {
        cfg.dest_base = p;
    }
    if let Some(m) = parsed.stale_minutes {
        cfg.stale_after = Duration::from_secs(m.saturating_mul(60));
    }
    if let Some(s) = parsed.deconflict_style.as_deref().filter(|s| !s.trim().is_empty()) {
        cfg.deconflict_style = s.parse::<DeconflictStyle>().map_err(|e| anyhow!(e))?;
    }
    if let Some(s) = parsed.differ.as_deref().filter(|s| !s.trim().is_empty()) {
        cfg.differ = s.parse::<DifferKind>().map_err(|e| anyhow!(e))?;
    }
    if let Some(s) = parsed.log_level.as_deref().filter(|s| !s.trim().is_empty()) {
        cfg.log_level = s.trim().parse::<LogLevel>().map_err(|e| anyhow!(e))?;
    }

    cfg.preserve_list = non_empty_path(parsed.preserve_list.as_deref());
    cfg.ownership_list = non_empty_path(parsed.ownership_list.as_deref());
    cfg.log_file = non_empty_path(parsed.log_file.as_deref());
    if let Some(p) = non_empty_path(parsed.audit_log.as_deref()) {
        cfg.audit_log = Some(p);
    }
    if let Some(p) = non_empty_path(parsed.lock_file.as_deref()) {
        cfg.lock_file = Some(p);
    }
    cfg.checksum = parsed.checksum.unwrap_or(false);
    cfg.dry_run = parsed.dry_run.unwrap_or(false);
    Ok(cfg)
}

/// Parse config XML text.
pub fn parse_config_xml(contents: &str) -> Result<Config> {
    let parsed: XmlConfig = from_xml_str(contents)?;
    xml_to_config(parsed)
}

/// Load a Config from a specific XML file path.
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let cfg = parse_config_xml(&contents).with_context(|| format!("parse config xml '{}'", path.display()))?;
    debug!(path = %path.display(), source = %cfg.source_base.display(), dest = %cfg.dest_base.display(), "loaded config");
    Ok(cfg)
}

/// Result of looking for the config file.
#[derive(Debug)]
pub enum ConfigLoad {
    /// File found and parsed.
    Loaded { config: Config, path: PathBuf },
    /// Default file was missing; a template was written there.
    TemplateCreated(PathBuf),
    /// No config file available; built-in defaults apply.
    Defaults,
}

/// Locate and load the config file.
/// - `TREE_MOVE_CONFIG` set: that file must exist and parse.
/// - otherwise the default path; if missing, a template is created.
pub fn load_config() -> Result<ConfigLoad> {
    if let Some(path) = paths::env_config_path() {
        if !path.exists() {
            bail!(
                "{} points to '{}', which does not exist",
                paths::CONFIG_ENV,
                path.display()
            );
        }
        let config = load_config_from_xml_path(&path)?;
        return Ok(ConfigLoad::Loaded { config, path });
    }

    let Some(path) = paths::default_config_path() else {
        return Ok(ConfigLoad::Defaults);
    };
    if path.exists() {
        let config = load_config_from_xml_path(&path)?;
        return Ok(ConfigLoad::Loaded { config, path });
    }
    match create_template_config(&path) {
        Ok(()) => Ok(ConfigLoad::TemplateCreated(path)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not create template config");
            Ok(ConfigLoad::Defaults)
        }
    }
}

/// Create default template config file and parent directory (best-effort permissions).
/// Refuses paths with symlinked ancestors; writes atomically with mode 0600.
pub fn create_template_config(path: &Path) -> Result<()> {
    if path_has_symlink_ancestor(path)? {
        bail!(
            "Refusing to create config: ancestor of {} is a symlink",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
        let _ = set_dir_mode_0700(parent);
    }

    let show = |p: Option<PathBuf>, fallback: &str| {
        p.map(|p| p.display().to_string())
            .unwrap_or_else(|| fallback.to_string())
    };
    let content = format!(
        "<!--\n  tree_move configuration (XML)\n\n  source_base       -> tree files are migrated out of\n  dest_base         -> tree files are migrated into (must already exist)\n  stale_minutes     -> empty source directories idle this long are removed\n  deconflict_style  -> append | before-last-dot | before-first-dot\n  preserve_list     -> optional file: source directories never removed (one per line)\n  ownership_list    -> optional file: owner:group<TAB>path rules for the destination\n  differ            -> walk | rsync\n  checksum          -> true/false: compare file contents while diffing\n  audit_log         -> append-only record of every action\n  log_level         -> quiet | normal | info | debug\n  log_file          -> optional log file (console output is kept)\n  lock_file         -> advisory run lock\n  dry_run           -> true/false: log planned actions only\n\n  CLI flags override XML values.\n-->\n<config>\n  <source_base>{}</source_base>\n  <dest_base>{}</dest_base>\n  <stale_minutes>{}</stale_minutes>\n  <deconflict_style>append</deconflict_style>\n  <preserve_list></preserve_list>\n  <ownership_list></ownership_list>\n  <differ>walk</differ>\n  <checksum>false</checksum>\n  <audit_log>{}</audit_log>\n  <log_level>normal</log_level>\n  <log_file></log_file>\n  <lock_file>{}</lock_file>\n  <dry_run>false</dry_run>\n</config>\n",
        SOURCE_BASE_DEFAULT,
        DEST_BASE_DEFAULT,
        DEFAULT_STALE_MINUTES,
        show(default_audit_path(), "/var/lib/tree_move/audit.log"),
        show(default_lock_path(), "/var/lib/tree_move/tree_move.lock"),
    );

    write_config_secure_new_0600(path, content.as_bytes())?;
    let _ = set_file_mode_0600(path);

    info!("Created template config at {}", path.display());
    Ok(())
}
