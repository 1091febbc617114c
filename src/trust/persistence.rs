//! Durable, versioned trust store snapshots.
//!
//! Snapshots are written pretty-printed with sorted keys and sorted entries so
//! the file diffs cleanly, always through an owner-only temp file renamed into
//! place. All access to one file goes through a single [`TrustStorePersistence`]
//! whose mutex totally orders loads, saves, and migration.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::{GateError, Result};
use crate::trust::store::TrustStore;
use crate::utils::fs::{read_optional, with_suffix, write_private_atomic};

/// The only snapshot format version this crate reads or writes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One trust decision: a key, optionally limited to one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TrustStoreEntry {
    pub key_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_slug: Option<String>,
    #[serde(with = "codec::iso8601")]
    pub added_at: DateTime<Utc>,
    /// Base64 of the raw public key.
    pub fingerprint: String,
}

impl TrustStoreEntry {
    fn sort_key(&self) -> (&str, Option<&str>) {
        (self.key_id.as_str(), self.scope_slug.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TrustStoreSnapshot {
    pub version: u32,
    pub entries: Vec<TrustStoreEntry>,
    #[serde(with = "codec::iso8601")]
    pub created_at: DateTime<Utc>,
}

impl TrustStoreSnapshot {
    #[must_use]
    pub fn new(entries: Vec<TrustStoreEntry>) -> Self {
        Self::with_created_at(entries, codec::now_utc())
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Sort entries by `(keyId, scopeSlug)` and keep the first entry for each
    /// `(keyId, scopeSlug)` pair.
    #[must_use]
    pub fn with_created_at(mut entries: Vec<TrustStoreEntry>, created_at: DateTime<Utc>) -> Self {
        entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        entries.dedup_by(|next, kept| next.key_id == kept.key_id && next.scope_slug == kept.scope_slug);
        Self {
            version: SNAPSHOT_VERSION,
            entries,
            created_at,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        codec::encode_snapshot(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        codec::decode_snapshot(bytes)
    }
}

/// Outcome of a one-time migration from the legacy unscoped store.
#[derive(Debug)]
pub enum MigrationResult {
    /// A snapshot already exists; nothing was read.
    NoMigrationNeeded,
    NoOldStoreFound,
    /// This many entries were written to the new snapshot.
    Migrated(usize),
    Failed(GateError),
}

/// Serialized access to one snapshot file.
#[derive(Debug)]
pub struct TrustStorePersistence {
    path: PathBuf,
    legacy_path: Option<PathBuf>,
    guard: Mutex<()>,
}

impl TrustStorePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            legacy_path: None,
            guard: Mutex::new(()),
        }
    }

    /// Default legacy location consulted by [`migrate`](Self::migrate).
    #[must_use]
    pub fn with_legacy_path(mut self, legacy_path: impl Into<PathBuf>) -> Self {
        self.legacy_path = Some(legacy_path.into());
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn legacy_path(&self) -> Option<&Path> {
        self.legacy_path.as_deref()
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write the snapshot atomically with owner-only permissions.
    pub fn save(&self, snapshot: &TrustStoreSnapshot) -> Result<()> {
        let _guard = self.guard.lock();
        self.save_unlocked(snapshot)
    }

    /// Read the snapshot; a missing file is an empty store.
    pub fn load(&self) -> Result<TrustStoreSnapshot> {
        let _guard = self.guard.lock();
        self.load_unlocked()
    }

    /// Remove the snapshot file. Returns whether a file was removed.
    pub fn delete(&self) -> Result<bool> {
        let _guard = self.guard.lock();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    pub fn load_store(&self) -> Result<TrustStore> {
        let snapshot = self.load()?;
        TrustStore::from_snapshot(&snapshot)
    }

    /// Persist `store`, keeping `addedAt` for entries that were already saved.
    pub fn save_store(&self, store: &TrustStore) -> Result<TrustStoreSnapshot> {
        let _guard = self.guard.lock();
        let previous = self.load_unlocked()?;
        let snapshot = store.to_snapshot(Some(&previous));
        self.save_unlocked(&snapshot)?;
        Ok(snapshot)
    }

    /// Import the legacy `{keys, revokedKeyIds}` store once.
    ///
    /// Safe to call on every start: once a snapshot exists this is a no-op.
    /// Failures are reported in the result, never raised.
    pub fn migrate(&self, old_store: Option<&Path>, archive_old: bool) -> MigrationResult {
        let _guard = self.guard.lock();

        if self.exists() {
            debug!(path = %self.path.display(), "trust store present, skipping migration");
            return MigrationResult::NoMigrationNeeded;
        }
        let Some(old) = old_store.or(self.legacy_path.as_deref()) else {
            return MigrationResult::NoOldStoreFound;
        };
        if !old.is_file() {
            return MigrationResult::NoOldStoreFound;
        }

        match self.migrate_unlocked(old, archive_old) {
            Ok(count) => {
                info!(from = %old.display(), to = %self.path.display(), count, "migrated legacy trust store");
                MigrationResult::Migrated(count)
            }
            Err(err) => {
                warn!(from = %old.display(), error = %err, "legacy trust store migration failed");
                MigrationResult::Failed(err)
            }
        }
    }

    fn migrate_unlocked(&self, old: &Path, archive_old: bool) -> Result<usize> {
        let bytes = std::fs::read(old)?;
        let legacy = codec::decode_legacy_store(&bytes)?;
        let now = codec::now_utc();

        let entries = legacy
            .keys
            .into_iter()
            .filter(|key| !legacy.revoked_key_ids.contains(&key.key_id))
            .map(|key| TrustStoreEntry {
                scope_slug: key.allowed_slugs.and_then(|slugs| slugs.into_iter().next()),
                key_id: key.key_id,
                added_at: now,
                fingerprint: key.public_key_base64,
            })
            .collect();
        let snapshot = TrustStoreSnapshot::with_created_at(entries, now);
        self.save_unlocked(&snapshot)?;

        if archive_old {
            let backup = with_suffix(old, ".backup");
            match std::fs::remove_file(&backup) {
                Ok(()) => debug!(path = %backup.display(), "replaced previous legacy backup"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
            std::fs::rename(old, &backup)?;
        }
        Ok(snapshot.entries.len())
    }

    fn save_unlocked(&self, snapshot: &TrustStoreSnapshot) -> Result<()> {
        let bytes = snapshot.encode()?;
        write_private_atomic(&self.path, &bytes)?;
        debug!(path = %self.path.display(), entries = snapshot.entries.len(), "saved trust store");
        Ok(())
    }

    fn load_unlocked(&self) -> Result<TrustStoreSnapshot> {
        match read_optional(&self.path)? {
            Some(bytes) => TrustStoreSnapshot::decode(&bytes),
            None => Ok(TrustStoreSnapshot::empty()),
        }
    }
}
