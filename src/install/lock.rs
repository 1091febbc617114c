//! Per-destination advisory lock.
//!
//! Installs into the same destination directory are serialized with an
//! exclusive `fs2` lock on a hidden sibling file, across threads and
//! processes alike. Installs into different destinations never contend.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GateError, Result};

/// Written into the lock file for operators inspecting a stuck install.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockHolder {
    pub pid: u32,
    pub acquired_at: chrono::DateTime<Utc>,
    pub destination: String,
}

/// Held for the duration of one install; released on drop.
#[derive(Debug)]
pub struct DestinationLock {
    file: File,
    path: PathBuf,
}

impl DestinationLock {
    /// Lock file path for `destination`: `<parent>/.<name>.lock`.
    #[must_use]
    pub fn lock_path(destination: &Path) -> PathBuf {
        let parent = destination.parent().unwrap_or_else(|| Path::new("."));
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        parent.join(format!(".{name}.lock"))
    }

    /// Block until the destination is free.
    pub fn acquire(destination: &Path) -> Result<Self> {
        let path = Self::lock_path(destination);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| GateError::LockFailed(format!("open {}: {e}", path.display())))?;

        file.lock_exclusive()
            .map_err(|e| GateError::LockFailed(format!("lock {}: {e}", path.display())))?;

        let holder = LockHolder {
            pid: std::process::id(),
            acquired_at: Utc::now(),
            destination: destination.display().to_string(),
        };
        if let Ok(json) = serde_json::to_vec(&holder) {
            // Informational only.
            let _ = file.set_len(0).and_then(|()| file.write_all(&json));
        }

        debug!(lock = %path.display(), "acquired destination lock");
        Ok(Self { file, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DestinationLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(lock = %self.path.display(), "released destination lock");
    }
}
