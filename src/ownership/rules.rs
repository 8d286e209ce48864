//! Ownership rule list.
//!
//! One rule per line: `owner:group<TAB>path`. `#` comments and blank lines are
//! skipped. Lines without a tab-separated spec and path are kept as rejected
//! so the run can report them.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipRule {
    pub spec: String,
    pub target: PathBuf,
    pub line: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnershipRules {
    rules: Vec<OwnershipRule>,
    rejected: Vec<String>,
}

impl OwnershipRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Self {
        let mut out = Self::default();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match line.split_once('\t') {
                Some((spec, target)) if !spec.trim().is_empty() && !target.trim().is_empty() => {
                    out.rules.push(OwnershipRule {
                        spec: spec.trim().to_string(),
                        target: PathBuf::from(target.trim()),
                        line: idx + 1,
                    });
                }
                _ => out
                    .rejected
                    .push(format!("line {}: expected 'owner:group<TAB>path', got {:?}", idx + 1, line)),
            }
        }
        out
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read ownership rules '{}'", path.display()))?;
        Ok(Self::parse(&text))
    }

    pub fn push(&mut self, spec: impl Into<String>, target: impl Into<PathBuf>) {
        let line = self.rules.len() + 1;
        self.rules.push(OwnershipRule {
            spec: spec.into(),
            target: target.into(),
            line,
        });
    }

    pub fn rules(&self) -> &[OwnershipRule] {
        &self.rules
    }

    /// Lines that could not be parsed.
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
