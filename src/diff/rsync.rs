//! Differ backed by an external `rsync` dry run.
//! Runs `rsync -a --dry-run -ii` so unchanged files are itemized too, then feeds
//! stdout through the itemized-line parser.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use super::{DiffItem, TreeDiffer, parse_itemized_bytes};
use crate::errors::TreeMoveError;

#[derive(Debug, Clone)]
pub struct RsyncDiffer {
    program: PathBuf,
    checksum: bool,
}

impl RsyncDiffer {
    pub fn new(checksum: bool) -> Self {
        Self {
            program: PathBuf::from("rsync"),
            checksum,
        }
    }

    /// Use a specific rsync binary (or a stand-in that prints itemized lines).
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Trailing slashes make rsync compare the directory contents, not the directories.
    fn with_trailing_slash(p: &Path) -> OsString {
        let mut s = p.as_os_str().to_os_string();
        if !s.to_string_lossy().ends_with('/') {
            s.push("/");
        }
        s
    }

    pub(crate) fn command_args(&self, source: &Path, dest: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-a".into(),
            "--dry-run".into(),
            "-ii".into(),
            "--out-format=%i %n%L".into(),
        ];
        if self.checksum {
            args.push("--checksum".into());
        }
        args.push(Self::with_trailing_slash(source));
        args.push(Self::with_trailing_slash(dest));
        args
    }
}

impl TreeDiffer for RsyncDiffer {
    fn diff(&self, source: &Path, dest: &Path) -> Result<Vec<DiffItem>> {
        let args = self.command_args(source, dest);
        debug!(program = %self.program.display(), ?args, "running rsync dry run");
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .with_context(|| format!("spawn '{}'", self.program.display()))?;

        if !output.status.success() {
            return Err(TreeMoveError::Differ {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        // Names are raw bytes; a lossy conversion would corrupt non-UTF-8 names.
        Ok(parse_itemized_bytes(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use serial_test::serial;
    use tempfile::tempdir;

    fn fake_rsync(dir: &Path, body: &str) -> PathBuf {
        let script = dir.join("fake-rsync");
        fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[test]
    fn args_carry_trailing_slashes_and_checksum() {
        let d = RsyncDiffer::new(true);
        let args = d.command_args(Path::new("/src"), Path::new("/dst/"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert!(args.contains(&"--checksum".to_string()));
        assert!(args.contains(&"-ii".to_string()));
        assert_eq!(args[args.len() - 2], "/src/");
        assert_eq!(args[args.len() - 1], "/dst/");
    }

    #[test]
    #[serial]
    fn parses_program_output() {
        let td = tempdir().unwrap();
        let script = fake_rsync(
            td.path(),
            "printf '%s\\n' '.d..t...... ./' '>f+++++++++ photo.jpg' 'not an itemized line'",
        );
        let items = RsyncDiffer::new(false)
            .with_program(script)
            .diff(td.path(), td.path())
            .unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[0].as_ref().unwrap().is_root());
        assert!(items[1].as_ref().unwrap().created);
        assert!(items[2].is_err());
    }

    #[test]
    #[serial]
    fn non_zero_exit_is_a_differ_error() {
        let td = tempdir().unwrap();
        let script = fake_rsync(td.path(), "echo 'rsync: change_dir failed' >&2\nexit 23");
        let err = RsyncDiffer::new(false)
            .with_program(script)
            .diff(td.path(), td.path())
            .unwrap_err();
        let typed = err.downcast_ref::<TreeMoveError>().expect("typed differ error");
        assert!(matches!(typed, TreeMoveError::Differ { code: Some(23), .. }));
    }
}
