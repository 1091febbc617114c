//! Artifact manifest published next to each skill archive.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::target::TargetKind;

/// Toolchain that produced the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltWith {
    pub tool: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// Signed metadata describing an archive's digest, size, and signer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactManifest {
    /// Hex SHA-256 of the archive bytes, compared case-insensitively.
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Base64 Ed25519 signature over the hex digest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted_signers: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_keys: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<BTreeSet<TargetKind>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_with: Option<BuiltWith>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_app_version: Option<String>,
}

impl ArtifactManifest {
    pub fn new(sha256: impl Into<String>) -> Self {
        Self {
            sha256: sha256.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn signed(mut self, signature: impl Into<String>, key_id: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self.signer_key_id = Some(key_id.into());
        self
    }

    #[must_use]
    pub fn with_targets(mut self, targets: impl IntoIterator<Item = TargetKind>) -> Self {
        self.targets = Some(targets.into_iter().collect());
        self
    }

    /// Whether the publisher allows installing into `kind`. No list means any.
    #[must_use]
    pub fn supports_target(&self, kind: TargetKind) -> bool {
        self.targets
            .as_ref()
            .is_none_or(|targets| targets.contains(&kind))
    }

    /// Whether the manifest declares `key_id` revoked.
    #[must_use]
    pub fn revokes(&self, key_id: &str) -> bool {
        self.revoked_keys
            .as_ref()
            .is_some_and(|revoked| revoked.contains(key_id))
    }
}
