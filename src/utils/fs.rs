//! Filesystem utilities.
//!
//! Helper functions for directory creation, atomic writes and same-filesystem
//! moves used by the installer and the trust store.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{GateError, Result};

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Read a file to bytes, returning None if it doesn't exist.
pub fn read_optional(path: impl AsRef<Path>) -> Result<Option<Vec<u8>>> {
    let path = path.as_ref();
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Append a literal suffix to a path (`trust.json` + `.backup` -> `trust.json.backup`).
#[must_use]
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// A uniquely named sibling of `path` in the same parent directory.
///
/// Used for staging and backup directories so the final rename never crosses
/// a filesystem boundary.
#[must_use]
pub fn unique_sibling(path: &Path, prefix: &str) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{prefix}{}", Uuid::new_v4().simple()))
}

/// Write `bytes` to `path` atomically with owner-only permissions.
///
/// The data lands in a temp file in the destination directory, gets mode
/// 0600, and is then renamed over `path`. Readers see either the old file or
/// the complete new one.
pub fn write_private_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    ensure_dir(dir)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(temp.path(), std::fs::Permissions::from_mode(0o600))?;
    }

    temp.persist(path).map_err(|err| GateError::Io(err.error))?;
    Ok(())
}

/// Move a directory, falling back to copy + remove when `from` and `to` live
/// on different filesystems. A failed fallback leaves nothing at `to`.
pub fn move_dir(from: &Path, to: &Path) -> Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) if is_cross_device(&err) => {
            debug!(
                from = %from.display(),
                to = %to.display(),
                "rename crosses filesystems, copying instead"
            );
            copy_then_remove(from, to, |p: &Path| std::fs::remove_dir_all(p))
        }
        Err(err) => Err(err.into()),
    }
}

fn copy_then_remove(
    from: &Path,
    to: &Path,
    remove_source: impl FnOnce(&Path) -> std::io::Result<()>,
) -> Result<()> {
    if to.symlink_metadata().is_ok() {
        return Err(GateError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", to.display()),
        )));
    }
    let moved = copy_dir_all(from, to).and_then(|()| remove_source(from).map_err(GateError::from));
    if moved.is_err() {
        if let Err(err) = std::fs::remove_dir_all(to) {
            debug!(path = %to.display(), error = %err, "failed to discard partial copy");
        }
    }
    moved
}

fn is_cross_device(err: &std::io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EXDEV)
    }
    #[cfg(not(unix))]
    {
        // ERROR_NOT_SAME_DEVICE
        err.raw_os_error() == Some(17)
    }
}

fn copy_dir_all(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir(to)?;
    for entry in WalkDir::new(from).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|err| GateError::Io(err.into()))?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(|err| GateError::Io(std::io::Error::other(err)))?;
        let dest = to.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir(&dest)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &dest)?;
        } else {
            return Err(GateError::Io(std::io::Error::other(format!(
                "refusing to copy non-regular file {}",
                entry.path().display()
            ))));
        }
    }
    Ok(())
}
