//! Default path helpers and symlink checks.
//! Determines OS-appropriate config/state paths and detects symlinked ancestors for safety.

use dirs::{config_dir, data_dir};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file (or a directory holding `config.xml`).
pub const CONFIG_ENV: &str = "TREE_MOVE_CONFIG";

const APP_DIR: &str = "tree_move";

/// Config path from `TREE_MOVE_CONFIG`, if set. Relative values are taken
/// relative to the current directory; a directory means `<dir>/config.xml`.
pub fn env_config_path() -> Option<PathBuf> {
    let raw = env::var_os(CONFIG_ENV)?;
    if raw.is_empty() {
        return None;
    }
    let mut p = PathBuf::from(raw);
    if p.is_relative()
        && let Ok(cwd) = env::current_dir()
    {
        p = cwd.join(p);
    }
    if p.is_dir() {
        p.push("config.xml");
    }
    Some(p)
}

/// OS-appropriate default config path (ignores the environment override).
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(mut base) = config_dir() {
        base.push(APP_DIR);
        base.push("config.xml");
        Some(base)
    } else {
        env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config").join(APP_DIR).join("config.xml"))
    }
}

/// The config file in effect: the environment override, else the default.
pub fn config_path() -> Option<PathBuf> {
    env_config_path().or_else(default_config_path)
}

fn data_file(name: &str) -> Option<PathBuf> {
    if let Some(mut base) = data_dir() {
        base.push(APP_DIR);
        base.push(name);
        Some(base)
    } else {
        env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".local").join("share").join(APP_DIR).join(name))
    }
}

/// Default audit trail location (data dir).
pub fn default_audit_path() -> Option<PathBuf> {
    data_file("audit.log")
}

/// Default run lock location (data dir).
pub fn default_lock_path() -> Option<PathBuf> {
    data_file("tree_move.lock")
}

/// Return true if any existing ancestor of `path` is a symlink.
pub fn path_has_symlink_ancestor(path: &Path) -> io::Result<bool> {
    let mut p = path.parent();
    while let Some(anc) = p {
        if anc.as_os_str().is_empty() {
            break;
        }
        match fs::symlink_metadata(anc) {
            Ok(meta) if meta.file_type().is_symlink() => return Ok(true),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        p = anc.parent();
    }
    Ok(false)
}
