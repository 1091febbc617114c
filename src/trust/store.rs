//! In-memory signer key lookup with optional per-package scoping.

use std::collections::{BTreeMap, BTreeSet};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use ring::signature::{ED25519, UnparsedPublicKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::codec;
use crate::error::{GateError, Result};
use crate::trust::persistence::{TrustStoreEntry, TrustStoreSnapshot};

const ED25519_PUBLIC_KEY_LEN: usize = 32;

/// A signer public key the local user has chosen to trust.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedKey {
    pub key_id: String,
    pub public_key_base64: String,
    /// `None` trusts the key for every package; `Some` limits it to these slugs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_slugs: Option<BTreeSet<String>>,
}

impl TrustedKey {
    pub fn new(key_id: impl Into<String>, public_key_base64: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            public_key_base64: public_key_base64.into(),
            allowed_slugs: None,
        }
    }

    #[must_use]
    pub fn scoped<I, S>(mut self, slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_slugs = Some(slugs.into_iter().map(Into::into).collect());
        self
    }

    /// Whether the key may vouch for `scope`. Without a scope every key applies.
    #[must_use]
    pub fn allows(&self, scope: Option<&str>) -> bool {
        match (scope, &self.allowed_slugs) {
            (Some(slug), Some(allowed)) => allowed.contains(slug),
            _ => true,
        }
    }

    /// Decode the raw Ed25519 public key.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>> {
        let bytes = STANDARD.decode(self.public_key_base64.trim()).map_err(|err| {
            GateError::InvalidKey(format!("{}: invalid base64: {err}", self.key_id))
        })?;
        if bytes.len() != ED25519_PUBLIC_KEY_LEN {
            return Err(GateError::InvalidKey(format!(
                "{}: expected {ED25519_PUBLIC_KEY_LEN} bytes, got {}",
                self.key_id,
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

/// Verify a detached Ed25519 signature with a base64 public key.
///
/// Returns `Ok(false)` for a signature that is malformed or does not verify,
/// and an error only when the key itself is unusable.
pub(crate) fn verify_ed25519(key: &TrustedKey, message: &[u8], signature_b64: &str) -> Result<bool> {
    let public_key = key.public_key_bytes()?;
    let Ok(signature) = STANDARD.decode(signature_b64.trim()) else {
        debug!(key_id = %key.key_id, "signature is not valid base64");
        return Ok(false);
    };
    let verifier = UnparsedPublicKey::new(&ED25519, public_key);
    Ok(verifier.verify(message, &signature).is_ok())
}

/// Signer keys indexed by key id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustStore {
    keys: BTreeMap<String, TrustedKey>,
}

impl TrustStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from keys, validating each one.
    pub fn with_keys(keys: impl IntoIterator<Item = TrustedKey>) -> Result<Self> {
        let mut store = Self::new();
        for key in keys {
            store.add_key(key)?;
        }
        Ok(store)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &TrustedKey> {
        self.keys.values()
    }

    #[must_use]
    pub fn get(&self, key_id: &str) -> Option<&TrustedKey> {
        self.keys.get(key_id)
    }

    /// Look up a key that may sign for `scope`.
    #[must_use]
    pub fn trusted_key(&self, key_id: &str, scope: Option<&str>) -> Option<&TrustedKey> {
        self.keys.get(key_id).filter(|key| key.allows(scope))
    }

    /// Verify `signature_b64` over the UTF-8 bytes of `hex_digest`.
    ///
    /// An unknown or out-of-scope key yields `Ok(false)`.
    pub fn verify_signature(
        &self,
        hex_digest: &str,
        signature_b64: &str,
        key_id: &str,
        scope: Option<&str>,
    ) -> Result<bool> {
        let Some(key) = self.trusted_key(key_id, scope) else {
            debug!(key_id, scope = ?scope, "no trusted key for signature");
            return Ok(false);
        };
        verify_ed25519(key, hex_digest.as_bytes(), signature_b64)
    }

    /// Insert a key, or rotate the material of one already present.
    ///
    /// A replacement with `allowed_slugs: None` keeps the existing key's
    /// scope, so rotating a scoped key never widens it to every package. Use
    /// [`TrustStore::set_scope`] to change a key's scope.
    pub fn add_key(&mut self, mut key: TrustedKey) -> Result<()> {
        if key.key_id.trim().is_empty() {
            return Err(GateError::InvalidKey("key id is empty".to_string()));
        }
        key.public_key_bytes()?;
        if key.allowed_slugs.is_none() {
            key.allowed_slugs = self
                .keys
                .get(&key.key_id)
                .and_then(|existing| existing.allowed_slugs.clone());
        }
        self.keys.insert(key.key_id.clone(), key);
        Ok(())
    }

    /// Replace a key's scope; `None` trusts it for every package. Returns
    /// whether the key was present.
    pub fn set_scope(&mut self, key_id: &str, allowed_slugs: Option<BTreeSet<String>>) -> bool {
        let Some(key) = self.keys.get_mut(key_id) else {
            return false;
        };
        debug!(key_id, scope = ?allowed_slugs, "changed trusted key scope");
        key.allowed_slugs = allowed_slugs;
        true
    }

    pub fn remove_key(&mut self, key_id: &str) -> Option<TrustedKey> {
        self.keys.remove(key_id)
    }

    /// Drop a key because its owner revoked it. Returns whether it was present.
    pub fn revoke(&mut self, key_id: &str) -> bool {
        let removed = self.keys.remove(key_id).is_some();
        if removed {
            debug!(key_id, "revoked trusted key");
        }
        removed
    }

    /// Rebuild a store from a persisted snapshot.
    ///
    /// Entries for the same key collapse into one key: a global entry makes it
    /// global, otherwise its scope is the union of entry slugs.
    pub fn from_snapshot(snapshot: &TrustStoreSnapshot) -> Result<Self> {
        let mut keys: BTreeMap<String, TrustedKey> = BTreeMap::new();
        let mut global: BTreeSet<&str> = BTreeSet::new();

        for entry in &snapshot.entries {
            let key = keys.entry(entry.key_id.clone()).or_insert_with(|| TrustedKey {
                key_id: entry.key_id.clone(),
                public_key_base64: entry.fingerprint.clone(),
                allowed_slugs: Some(BTreeSet::new()),
            });
            if key.public_key_base64 != entry.fingerprint {
                return Err(GateError::Decode(format!(
                    "trust store: key {} has conflicting fingerprints",
                    entry.key_id
                )));
            }
            match &entry.scope_slug {
                Some(slug) => {
                    if let Some(allowed) = key.allowed_slugs.as_mut() {
                        allowed.insert(slug.clone());
                    }
                }
                None => {
                    global.insert(entry.key_id.as_str());
                    key.allowed_slugs = None;
                }
            }
        }

        let mut store = Self::new();
        for (key_id, mut key) in keys {
            if global.contains(key_id.as_str()) {
                key.allowed_slugs = None;
            }
            if let Err(err) = key.public_key_bytes() {
                warn!(key_id = %key_id, error = %err, "skipping unusable key in trust store");
                continue;
            }
            store.keys.insert(key_id, key);
        }
        Ok(store)
    }

    /// Snapshot the store, keeping `addedAt` for entries already in `previous`.
    #[must_use]
    pub fn to_snapshot(&self, previous: Option<&TrustStoreSnapshot>) -> TrustStoreSnapshot {
        let now = codec::now_utc();
        let known: BTreeMap<(&str, Option<&str>), DateTime<Utc>> = previous
            .map(|snapshot| {
                snapshot
                    .entries
                    .iter()
                    .map(|e| ((e.key_id.as_str(), e.scope_slug.as_deref()), e.added_at))
                    .collect()
            })
            .unwrap_or_default();

        let entry = |key: &TrustedKey, scope: Option<&String>| TrustStoreEntry {
            key_id: key.key_id.clone(),
            scope_slug: scope.cloned(),
            added_at: known
                .get(&(key.key_id.as_str(), scope.map(String::as_str)))
                .copied()
                .unwrap_or(now),
            fingerprint: key.public_key_base64.clone(),
        };

        let mut entries = Vec::new();
        for key in self.keys.values() {
            match &key.allowed_slugs {
                None => entries.push(entry(key, None)),
                Some(slugs) => entries.extend(slugs.iter().map(|slug| entry(key, Some(slug)))),
            }
        }
        TrustStoreSnapshot::with_created_at(entries, now)
    }
}
