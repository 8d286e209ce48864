//! Byte-for-byte file comparison.
//! Both files are streamed through 1 MiB buffers; the first differing chunk
//! ends the comparison. Sizes are checked first so most mismatches cost one stat.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

const BUF_SIZE: usize = 1024 * 1024;

/// Read until `buf` is full or EOF; returns bytes read.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// True when both paths are regular files with identical content.
pub fn files_identical(a: &Path, b: &Path) -> io::Result<bool> {
    let meta_a = fs::metadata(a)?;
    let meta_b = fs::metadata(b)?;
    if !meta_a.is_file() || !meta_b.is_file() || meta_a.len() != meta_b.len() {
        return Ok(false);
    }

    let mut fa = File::open(a)?;
    let mut fb = File::open(b)?;
    let mut buf_a = vec![0u8; BUF_SIZE];
    let mut buf_b = vec![0u8; BUF_SIZE];
    loop {
        let na = fill(&mut fa, &mut buf_a)?;
        let nb = fill(&mut fb, &mut buf_b)?;
        if na != nb || buf_a[..na] != buf_b[..nb] {
            return Ok(false);
        }
        if na == 0 {
            return Ok(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn identical_files() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let b = td.path().join("b");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();
        assert!(files_identical(&a, &b).unwrap());
    }

    #[test]
    fn same_size_different_bytes() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let b = td.path().join("b");
        fs::write(&a, b"abc").unwrap();
        fs::write(&b, b"abd").unwrap();
        assert!(!files_identical(&a, &b).unwrap());
    }

    #[test]
    fn difference_past_first_buffer() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let b = td.path().join("b");
        let mut data = vec![7u8; BUF_SIZE + 10];
        fs::write(&a, &data).unwrap();
        data[BUF_SIZE + 5] = 8;
        fs::write(&b, &data).unwrap();
        assert!(!files_identical(&a, &b).unwrap());
    }

    #[test]
    fn empty_files_are_identical() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let b = td.path().join("b");
        File::create(&a).unwrap();
        File::create(&b).unwrap();
        assert!(files_identical(&a, &b).unwrap());
    }

    #[test]
    fn missing_counterpart_is_an_error() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        fs::write(&a, b"x").unwrap();
        assert!(files_identical(&a, &td.path().join("missing")).is_err());
    }

    #[test]
    fn directory_is_never_identical_to_file() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        fs::write(&a, b"x").unwrap();
        assert!(!files_identical(&a, td.path()).unwrap());
    }
}
