//! Archive verification against a manifest, a trust store, and a policy.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{GateError, LimitKind, Result};
use crate::trust::TrustStore;
use crate::verify::manifest::ArtifactManifest;
use crate::verify::policy::{VerificationMode, VerificationPolicy};

pub const ISSUE_MANIFEST_MISSING: &str = "Manifest missing";
pub const ISSUE_SIGNATURE_MISSING: &str = "Signature missing";
pub const ISSUE_SIGNER_UNTRUSTED: &str = "Signer not trusted locally";

/// Result of evaluating one archive. Built once per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub mode: VerificationMode,
    pub checksum_validated: bool,
    pub signature_validated: bool,
    pub trusted_signer: bool,
    /// Soft issues in the order they were found.
    pub issues: Vec<String>,
}

impl VerificationOutcome {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Hex SHA-256 of a file, streamed.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Checks archive size, digest, signature, and signer trust.
///
/// Integrity failures (size, digest, signer allowlist, revocation) are errors
/// under every policy. Signature and local-trust problems are soft issues that
/// only fail verification in strict mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactVerifier;

impl ArtifactVerifier {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    pub fn verify(
        &self,
        archive: &Path,
        manifest: Option<&ArtifactManifest>,
        policy: &VerificationPolicy,
        trust_store: &TrustStore,
        scope_slug: Option<&str>,
    ) -> Result<VerificationOutcome> {
        let outcome = self.evaluate(archive, manifest, policy, trust_store, scope_slug)?;
        if policy.is_strict() && !outcome.is_clean() {
            warn!(
                archive = %archive.display(),
                issues = ?outcome.issues,
                "strict verification rejected archive"
            );
            return Err(GateError::VerificationFailed {
                issues: outcome.issues,
            });
        }
        if !outcome.is_clean() {
            info!(
                archive = %archive.display(),
                issues = ?outcome.issues,
                "permissive verification passed with issues"
            );
        }
        Ok(outcome)
    }

    fn evaluate(
        &self,
        archive: &Path,
        manifest: Option<&ArtifactManifest>,
        policy: &VerificationPolicy,
        trust_store: &TrustStore,
        scope_slug: Option<&str>,
    ) -> Result<VerificationOutcome> {
        let metadata = std::fs::metadata(archive).map_err(|err| {
            GateError::ArchiveUnreadable(format!("{}: {err}", archive.display()))
        })?;
        if !metadata.is_file() {
            return Err(GateError::ArchiveUnreadable(format!(
                "{} is not a regular file",
                archive.display()
            )));
        }
        let actual_size = metadata.len();
        if actual_size > policy.limits.max_archive_bytes {
            return Err(GateError::LimitExceeded {
                kind: LimitKind::ArchiveBytes,
                detail: format!(
                    "Archive exceeds size limit ({actual_size} > {} bytes)",
                    policy.limits.max_archive_bytes
                ),
            });
        }

        let mut outcome = VerificationOutcome {
            mode: policy.mode,
            checksum_validated: false,
            signature_validated: false,
            trusted_signer: false,
            issues: Vec::new(),
        };

        let Some(manifest) = manifest else {
            outcome.issues.push(ISSUE_MANIFEST_MISSING.to_string());
            return Ok(outcome);
        };

        if let Some(expected) = manifest.size {
            if expected != actual_size {
                return Err(GateError::SizeMismatch {
                    expected,
                    actual: actual_size,
                });
            }
        }

        let digest = sha256_file(archive)?;
        if !digest.eq_ignore_ascii_case(manifest.sha256.trim()) {
            return Err(GateError::ChecksumMismatch {
                expected: manifest.sha256.clone(),
                actual: digest,
            });
        }
        outcome.checksum_validated = true;
        debug!(archive = %archive.display(), sha256 = %digest, "checksum validated");

        let signer = manifest.signer_key_id.as_deref();
        match (manifest.signature.as_deref(), signer) {
            (Some(signature), Some(key_id)) => {
                let valid = trust_store
                    .verify_signature(&digest, signature, key_id, scope_slug)
                    .unwrap_or_else(|err| {
                        warn!(key_id, error = %err, "signature check failed");
                        false
                    });
                outcome.signature_validated = valid;
                if !valid {
                    outcome
                        .issues
                        .push(format!("Signature invalid for key {key_id}"));
                }
            }
            _ => outcome.issues.push(ISSUE_SIGNATURE_MISSING.to_string()),
        }

        if let Some(key_id) = signer {
            if let Some(allowed) = &manifest.trusted_signers {
                if !allowed.contains(key_id) {
                    return Err(GateError::SignerNotTrustedForScope(key_id.to_string()));
                }
            }
            if manifest.revokes(key_id) {
                return Err(GateError::SignerRevoked(key_id.to_string()));
            }

            outcome.trusted_signer = trust_store.trusted_key(key_id, scope_slug).is_some();
            if !outcome.trusted_signer {
                outcome.issues.push(ISSUE_SIGNER_UNTRUSTED.to_string());
            }
        }

        Ok(outcome)
    }
}
