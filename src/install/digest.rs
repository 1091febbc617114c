//! Directory walks: size and file counts, and the content-addressable hash of
//! an installed skill.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{GateError, Result};
use crate::install::archive::symlink_error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectoryStats {
    /// Regular files only.
    pub files: usize,
    /// Sum of logical file lengths.
    pub bytes: u64,
}

fn walk_error(err: walkdir::Error) -> GateError {
    GateError::Io(err.into())
}

/// Relative path with `/` separators regardless of platform.
fn portable_rel(root: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|err| GateError::Io(std::io::Error::other(err)))?;
    Ok(rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

/// Count regular files and bytes under `root`, refusing symlinks.
pub fn directory_stats(root: &Path) -> Result<DirectoryStats> {
    let mut stats = DirectoryStats::default();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(walk_error)?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            return Err(symlink_error());
        }
        if file_type.is_file() {
            stats.files += 1;
            stats.bytes += entry.metadata().map_err(walk_error)?.len();
        }
    }
    Ok(stats)
}

/// SHA-256 over every regular file under `root`, ordered by relative path.
///
/// Each file contributes its `/`-separated relative path, a NUL byte, then its
/// contents, so the digest ignores timestamps and extraction order.
pub fn content_sha256(root: &Path) -> Result<String> {
    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(walk_error)?;
        if entry.file_type().is_file() {
            files.push((portable_rel(root, entry.path())?, entry.into_path()));
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    for (rel, path) in files {
        hasher.update(rel.as_bytes());
        hasher.update([0u8]);
        let mut reader = BufReader::new(File::open(&path)?);
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
    }
    Ok(hex::encode(hasher.finalize()))
}
