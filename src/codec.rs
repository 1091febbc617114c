//! Versioned decode layer for every JSON format skillgate reads.
//!
//! Manifests and keysets arrive from the network, snapshots and legacy stores
//! from disk. Each has exactly one entry point here so format checks (snapshot
//! version, semver fields, duplicate entries) live in one place and surface as
//! [`GateError::Decode`].

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};
use crate::trust::keyset::Keyset;
use crate::trust::persistence::{SNAPSHOT_VERSION, TrustStoreSnapshot};
use crate::verify::manifest::ArtifactManifest;

/// Current time truncated to whole seconds, the resolution dates are stored at.
#[must_use]
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Format a timestamp the way every persisted and signed document does.
#[must_use]
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_date(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|d| d.with_timezone(&Utc))
}

/// Serde adapter for ISO-8601 timestamps (`2026-01-02T03:04:05Z`).
pub mod iso8601 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&super::format_date(date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(de)?;
        super::parse_date(&raw).map_err(serde::de::Error::custom)
    }

    /// Same as the parent module for `Option<DateTime<Utc>>` fields.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(
            date: &Option<DateTime<Utc>>,
            ser: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => ser.serialize_str(&super::super::format_date(date)),
                None => ser.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            de: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw = Option::<String>::deserialize(de)?;
            raw.map(|raw| super::super::parse_date(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

/// Decode a manifest fetched alongside an archive.
pub fn decode_manifest(bytes: &[u8]) -> Result<ArtifactManifest> {
    let manifest: ArtifactManifest = serde_json::from_slice(bytes)
        .map_err(|err| GateError::Decode(format!("manifest: {err}")))?;

    if manifest.sha256.trim().is_empty() {
        return Err(GateError::Decode("manifest: sha256 is empty".to_string()));
    }
    if let Some(version) = &manifest.version {
        semver::Version::parse(version)
            .map_err(|err| GateError::Decode(format!("manifest: version {version:?}: {err}")))?;
    }
    if let Some(min) = &manifest.min_app_version {
        semver::Version::parse(min).map_err(|err| {
            GateError::Decode(format!("manifest: minAppVersion {min:?}: {err}"))
        })?;
    }
    Ok(manifest)
}

/// Decode a signed keyset. Signature and expiry are checked at merge time.
pub fn decode_keyset(bytes: &[u8]) -> Result<Keyset> {
    serde_json::from_slice(bytes).map_err(|err| GateError::Decode(format!("keyset: {err}")))
}

/// Decode a persisted trust store snapshot.
pub fn decode_snapshot(bytes: &[u8]) -> Result<TrustStoreSnapshot> {
    let snapshot: TrustStoreSnapshot = serde_json::from_slice(bytes)
        .map_err(|err| GateError::Decode(format!("trust store: {err}")))?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(GateError::Decode(format!(
            "trust store: unsupported version {} (expected {SNAPSHOT_VERSION})",
            snapshot.version
        )));
    }

    let mut seen = BTreeSet::new();
    for entry in &snapshot.entries {
        if !seen.insert((entry.key_id.as_str(), entry.scope_slug.as_deref())) {
            return Err(GateError::Decode(format!(
                "trust store: duplicate entry for key {} scope {}",
                entry.key_id,
                entry.scope_slug.as_deref().unwrap_or("<global>")
            )));
        }
    }

    // Re-sort in case the file was edited by hand.
    Ok(TrustStoreSnapshot::with_created_at(
        snapshot.entries,
        snapshot.created_at,
    ))
}

/// Encode a snapshot: pretty printed, keys and entries sorted.
pub fn encode_snapshot(snapshot: &TrustStoreSnapshot) -> Result<Vec<u8>> {
    // serde_json::Value keeps object keys in a BTreeMap, so a round trip
    // through it yields sorted keys.
    let value = serde_json::to_value(snapshot)?;
    let mut bytes = serde_json::to_vec_pretty(&value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// The unscoped store format written before snapshots existed.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LegacyTrustStore {
    pub keys: Vec<LegacyKey>,
    #[serde(default)]
    pub revoked_key_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LegacyKey {
    pub key_id: String,
    pub public_key_base64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_slugs: Option<Vec<String>>,
}

/// Decode the legacy store, the only pre-snapshot shape still accepted.
pub fn decode_legacy_store(bytes: &[u8]) -> Result<LegacyTrustStore> {
    serde_json::from_slice(bytes).map_err(|err| GateError::Decode(format!("legacy store: {err}")))
}
