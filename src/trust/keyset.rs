//! Signed keyset distribution.
//!
//! A keyset is a bundle of signer keys published under a pinned root key. It
//! is only merged into a [`TrustStore`] after its signature verifies against
//! the root key and it has not expired.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::codec;
use crate::error::{GateError, Result};
use crate::trust::store::{TrustStore, TrustedKey, verify_ed25519};

const SUPPORTED_ALGORITHM: &str = "ed25519";

/// A signer key as published in a keyset.
///
/// Unlike [`TrustedKey`], slugs stay in the order the publisher wrote them:
/// the signature covers the arrays as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeysetKey {
    pub key_id: String,
    pub public_key_base64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_slugs: Option<Vec<String>>,
}

impl KeysetKey {
    #[must_use]
    pub fn to_trusted_key(&self) -> TrustedKey {
        TrustedKey {
            key_id: self.key_id.clone(),
            public_key_base64: self.public_key_base64.clone(),
            allowed_slugs: self
                .allowed_slugs
                .as_ref()
                .map(|slugs| slugs.iter().cloned().collect()),
        }
    }
}

impl From<TrustedKey> for KeysetKey {
    fn from(key: TrustedKey) -> Self {
        Self {
            key_id: key.key_id,
            public_key_base64: key.public_key_base64,
            allowed_slugs: key.allowed_slugs.map(|slugs| slugs.into_iter().collect()),
        }
    }
}

/// A signed bundle of trusted signer keys, kept in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyset {
    pub keys: Vec<KeysetKey>,
    #[serde(default)]
    pub revoked_key_ids: Vec<String>,
    #[serde(default, with = "codec::iso8601::option", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_algorithm: Option<String>,
    #[serde(default, with = "codec::iso8601::option", skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyset_version: Option<i64>,
}

/// What a keyset merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KeysetMerge {
    pub added: usize,
    pub updated: usize,
    pub revoked: usize,
}

impl Keyset {
    /// The exact bytes the publisher signs.
    ///
    /// A JSON object with sorted keys holding `keys`, `revokedKeyIds`,
    /// `expiresAt`, `signedAt` and `keysetVersion`. Object keys are sorted,
    /// arrays keep their published order, absent values are omitted, dates
    /// are whole-second UTC, and `/` is written as `\/`.
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        let mut payload = Map::new();
        payload.insert("keys".to_string(), serde_json::to_value(&self.keys)?);
        payload.insert(
            "revokedKeyIds".to_string(),
            serde_json::to_value(&self.revoked_key_ids)?,
        );
        if let Some(expires_at) = &self.expires_at {
            payload.insert("expiresAt".to_string(), Value::String(codec::format_date(expires_at)));
        }
        if let Some(signed_at) = &self.signed_at {
            payload.insert("signedAt".to_string(), Value::String(codec::format_date(signed_at)));
        }
        if let Some(version) = self.keyset_version {
            payload.insert("keysetVersion".to_string(), Value::from(version));
        }

        let text = serde_json::to_string(&Value::Object(payload))?;
        Ok(text.replace('/', "\\/").into_bytes())
    }

    /// Check the detached signature against the pinned root key.
    #[must_use]
    pub fn verify_signature(&self, root_public_key_base64: &str) -> bool {
        let Some(signature) = self.signature.as_deref() else {
            return false;
        };
        if let Some(algorithm) = &self.signature_algorithm {
            if !algorithm.eq_ignore_ascii_case(SUPPORTED_ALGORITHM) {
                warn!(algorithm = %algorithm, "unsupported keyset signature algorithm");
                return false;
            }
        }

        let payload = match self.signing_payload() {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to build keyset signing payload");
                return false;
            }
        };
        let root = TrustedKey::new("keyset-root", root_public_key_base64);
        match verify_ed25519(&root, &payload, signature) {
            Ok(valid) => valid,
            Err(err) => {
                warn!(error = %err, "keyset root key is unusable");
                false
            }
        }
    }

    /// True iff an expiry is set and `now` has reached it.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

impl TrustStore {
    /// Merge a keyset after checking expiry, then its signature.
    ///
    /// Nothing changes unless both checks pass and every incoming key is
    /// well formed. Existing keys keep their scope when they have one.
    pub fn apply_keyset(
        &mut self,
        keyset: &Keyset,
        root_public_key_base64: &str,
        now: DateTime<Utc>,
    ) -> Result<KeysetMerge> {
        if keyset.is_expired(now) {
            let expired = keyset
                .expires_at
                .as_ref()
                .map(codec::format_date)
                .unwrap_or_default();
            return Err(GateError::KeysetRejected(format!("keyset expired at {expired}")));
        }
        if !keyset.verify_signature(root_public_key_base64) {
            return Err(GateError::KeysetRejected(
                "keyset signature verification failed".to_string(),
            ));
        }
        let incoming: Vec<TrustedKey> = keyset.keys.iter().map(KeysetKey::to_trusted_key).collect();
        for key in &incoming {
            key.public_key_bytes()?;
        }

        let mut merge = KeysetMerge::default();
        let mut next = self.clone();
        for mut key in incoming {
            match self.get(&key.key_id) {
                Some(existing) => {
                    if existing.allowed_slugs.is_some() {
                        key.allowed_slugs.clone_from(&existing.allowed_slugs);
                    }
                    merge.updated += 1;
                }
                None => merge.added += 1,
            }
            next.remove_key(&key.key_id);
            next.add_key(key)?;
        }
        for key_id in &keyset.revoked_key_ids {
            if next.revoke(key_id) {
                merge.revoked += 1;
            }
        }

        *self = next;
        info!(
            version = ?keyset.keyset_version,
            added = merge.added,
            updated = merge.updated,
            revoked = merge.revoked,
            "applied keyset"
        );
        Ok(merge)
    }
}
