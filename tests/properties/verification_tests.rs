//! Property-based tests for archive verification outcomes.

use proptest::prelude::*;
use tempfile::TempDir;

use skillgate::GateError;
use skillgate::trust::TrustStore;
use skillgate::verify::{ArtifactManifest, ArtifactVerifier, VerificationPolicy, sha256_file};

fn write_archive(bytes: &[u8]) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("artifact.zip");
    std::fs::write(&path, bytes).unwrap();
    (dir, path)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn wrong_digest_fails_in_every_mode(
        bytes in proptest::collection::vec(any::<u8>(), 0..2048),
        claimed in "[0-9a-f]{64}",
    ) {
        let (_dir, archive) = write_archive(&bytes);
        let actual = sha256_file(&archive).unwrap();
        prop_assume!(!actual.eq_ignore_ascii_case(&claimed));

        let manifest = ArtifactManifest::new(claimed);
        let store = TrustStore::new();
        for policy in [VerificationPolicy::strict(), VerificationPolicy::permissive()] {
            let err = ArtifactVerifier::new()
                .verify(&archive, Some(&manifest), &policy, &store, None)
                .unwrap_err();
            let is_checksum_mismatch = matches!(err, GateError::ChecksumMismatch { .. });
            prop_assert!(is_checksum_mismatch);
            prop_assert!(err.to_string().contains("Checksum mismatch"));
        }
    }

    #[test]
    fn digest_comparison_ignores_case(bytes in proptest::collection::vec(any::<u8>(), 0..1024)) {
        let (_dir, archive) = write_archive(&bytes);
        let digest = sha256_file(&archive).unwrap().to_uppercase();
        let outcome = ArtifactVerifier::new()
            .verify(
                &archive,
                Some(&ArtifactManifest::new(digest)),
                &VerificationPolicy::permissive(),
                &TrustStore::new(),
                None,
            )
            .unwrap();
        prop_assert!(outcome.checksum_validated);
    }

    #[test]
    fn soft_issues_only_escalate_in_strict_mode(
        bytes in proptest::collection::vec(any::<u8>(), 0..1024),
        signature in proptest::option::of("[A-Za-z0-9+/]{0,88}"),
        signer in proptest::option::of("[a-z]{1,8}"),
    ) {
        let (_dir, archive) = write_archive(&bytes);
        let mut manifest = ArtifactManifest::new(sha256_file(&archive).unwrap());
        manifest.signature = signature;
        manifest.signer_key_id = signer;
        let store = TrustStore::new();
        let verifier = ArtifactVerifier::new();

        let outcome = verifier
            .verify(&archive, Some(&manifest), &VerificationPolicy::permissive(), &store, None)
            .unwrap();
        prop_assert!(!outcome.issues.is_empty());
        prop_assert!(!outcome.signature_validated);

        let strict = verifier.verify(&archive, Some(&manifest), &VerificationPolicy::strict(), &store, None);
        let escalated = matches!(strict, Err(GateError::VerificationFailed { .. }));
        prop_assert!(escalated);
    }
}
