//! Parser for rsync's itemized change lines (`%i %n%L`).
//!
//! Format: an 11-character change string `YXcstpoguax`, one space, then the
//! path. Directories end in `/`, symlinks may carry ` -> target`, hard links
//! ` => target`. Every malformed line comes back as a `MalformedEntry` rather
//! than an error so a single bad line never aborts a run.
//!
//! Names are handled as bytes: rsync prints bytes it considers unprintable
//! (and a backslash that precedes `#`) as `\#ooo` octal escapes, which are
//! decoded back into the original, possibly non-UTF-8, file name.

use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;
use std::path::PathBuf;

use super::{ChangeKind, DiffEntry, DiffItem, ItemKind, MalformedEntry, UpdateType, validate_rel_path};

const BITS_LEN: usize = 11;

fn malformed(raw: &[u8], reason: impl Into<String>) -> DiffItem {
    Err(MalformedEntry {
        raw: String::from_utf8_lossy(raw).into_owned(),
        reason: reason.into(),
    })
}

/// Parse a whole block of itemized output. Blank lines are skipped.
pub fn parse_itemized(text: &str) -> Vec<DiffItem> {
    parse_itemized_bytes(text.as_bytes())
}

/// Parse raw rsync stdout without assuming it is valid UTF-8.
pub fn parse_itemized_bytes(out: &[u8]) -> Vec<DiffItem> {
    out.split(|b| *b == b'\n')
        .filter(|l| !l.trim_ascii().is_empty())
        .map(parse_itemized_line_bytes)
        .collect()
}

/// Parse one itemized line.
pub fn parse_itemized_line(line: &str) -> DiffItem {
    parse_itemized_line_bytes(line.as_bytes())
}

fn parse_itemized_line_bytes(line: &[u8]) -> DiffItem {
    let line = trim_line_end(line);
    if line.len() < BITS_LEN + 2 {
        return malformed(line, "line too short for an itemized record");
    }
    let (bits, rest) = line.split_at(BITS_LEN);
    if !bits.is_ascii() {
        return malformed(line, "non-ASCII change string");
    }
    let Some(name) = rest.strip_prefix(b" ") else {
        return malformed(line, "missing separator after change string");
    };

    let Some(update) = UpdateType::from_char(bits[0] as char) else {
        return malformed(line, format!("unknown update type '{}'", bits[0] as char));
    };

    // `*deleting   name`: the remainder of the change string is message text.
    if update == UpdateType::Message {
        let name = name.trim_ascii_start();
        let kind = if name.ends_with(b"/") { ItemKind::Dir } else { ItemKind::File };
        return match to_rel_path(name) {
            Ok(rel) => Ok(DiffEntry::new(rel, kind, update)),
            Err(reason) => malformed(line, reason),
        };
    }

    let Some(kind) = ItemKind::from_char(bits[1] as char) else {
        return malformed(line, format!("unknown item type '{}'", bits[1] as char));
    };

    let attrs = &bits[2..];
    let mut entry = DiffEntry::new(PathBuf::new(), kind, update);
    if attrs.iter().all(|b| *b == b'+') {
        entry.created = true;
    } else {
        for (col, kind_at) in attrs.iter().zip(ChangeKind::ALL) {
            match *col {
                b'.' | b' ' | b'?' => {}
                b'T' if kind_at == ChangeKind::Time => entry.changes.insert(kind_at),
                // rsync 3.2 shows access/create time changes in the `u` column as `n`/`b`.
                b'n' | b'b' if kind_at == ChangeKind::UnnamedAttr => entry.changes.insert(kind_at),
                c if c as char == kind_at.column_char() => entry.changes.insert(kind_at),
                c => {
                    return malformed(line, format!("unexpected attribute flag '{}'", c as char));
                }
            }
        }
    }

    let name = match kind {
        ItemKind::Symlink => split_suffix(name, b" -> "),
        _ if update == UpdateType::HardLink => split_suffix(name, b" => "),
        _ => name,
    };

    match to_rel_path(name) {
        Ok(rel) => {
            entry.rel_path = rel;
            Ok(entry)
        }
        Err(reason) => malformed(line, reason),
    }
}

fn trim_line_end(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., b'\n' | b'\r'] = line {
        line = rest;
    }
    line
}

/// Everything before the first `sep`, or the whole name.
fn split_suffix<'a>(name: &'a [u8], sep: &[u8]) -> &'a [u8] {
    name.windows(sep.len())
        .position(|w| w == sep)
        .map_or(name, |at| &name[..at])
}

/// Undo rsync's `\#ooo` escaping. Anything that is not a backslash, `#` and
/// three octal digits is kept as written.
fn unescape_name(name: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len());
    let mut i = 0;
    while i < name.len() {
        if let &[b'\\', b'#', a @ b'0'..=b'3', b @ b'0'..=b'7', c @ b'0'..=b'7', ..] = &name[i..] {
            out.push(((a - b'0') << 6) | ((b - b'0') << 3) | (c - b'0'));
            i += 5;
        } else {
            out.push(name[i]);
            i += 1;
        }
    }
    out
}

fn to_rel_path(name: &[u8]) -> Result<PathBuf, String> {
    if name.is_empty() {
        return Err("empty path".into());
    }
    if name == b"./" || name == b"." {
        return Ok(PathBuf::from("."));
    }
    let trimmed = name.strip_suffix(b"/").unwrap_or(name);
    let raw = unescape_name(trimmed);
    if raw.contains(&0) {
        return Err("NUL byte in path".into());
    }
    let rel = PathBuf::from(OsString::from_vec(raw));
    validate_rel_path(&rel)?;
    Ok(rel)
}
