use chrono::{Duration, Utc};

use skillgate::codec;
use skillgate::install::ArchiveInstaller;
use skillgate::target::TargetKind;
use skillgate::test_utils::{TestLogger, TestSigner};
use skillgate::trust::{Keyset, TrustStore, TrustStorePersistence};
use skillgate::GateError;

use crate::fixture::{SignedSkill, strict};

/// Publish a keyset the way a distributor would: sign the payload, write JSON.
fn publish(root: &TestSigner, mut keyset: Keyset) -> Vec<u8> {
    keyset.signature_algorithm = Some("ed25519".to_string());
    keyset.signature = Some(root.sign_base64(&keyset.signing_payload().unwrap()));
    serde_json::to_vec_pretty(&keyset).unwrap()
}

fn keyset_with(skill: &SignedSkill, expires_in: Duration) -> Keyset {
    Keyset {
        keys: vec![skill.signer.trusted_key().into()],
        revoked_key_ids: Default::default(),
        expires_at: Some(codec::now_utc() + expires_in),
        signature: None,
        signature_algorithm: None,
        signed_at: Some(codec::now_utc()),
        keyset_version: Some(1),
    }
}

#[test]
fn published_keyset_bootstraps_trust_for_installs() {
    let log = TestLogger::new("published_keyset_bootstraps_trust_for_installs");
    let skill = SignedSkill::new();
    let root = TestSigner::new("root");

    log.step("decode and apply the published keyset");
    let bytes = publish(&root, keyset_with(&skill, Duration::days(30)));
    let keyset = codec::decode_keyset(&bytes).unwrap();
    let mut store = TrustStore::new();
    let merge = store
        .apply_keyset(&keyset, &root.public_key_base64(), Utc::now())
        .unwrap();
    log.log_actual(&merge);
    assert_eq!(merge.added, 1);

    log.step("persist and reload");
    let persistence = TrustStorePersistence::new(skill.fixture.path("trust.json"));
    persistence.save_store(&store).unwrap();
    let store = persistence.load_store().unwrap();

    log.step("install with the bootstrapped store");
    ArchiveInstaller::new()
        .install(
            &skill.archive,
            &skill.fixture.target(TargetKind::Codex),
            Some(&skill.manifest),
            &store,
            &strict(),
        )
        .unwrap();
    log.pass();
}

#[test]
fn expired_keyset_is_rejected_even_when_signed() {
    let skill = SignedSkill::new();
    let root = TestSigner::new("root");
    let bytes = publish(&root, keyset_with(&skill, -Duration::hours(1)));
    let keyset = codec::decode_keyset(&bytes).unwrap();

    assert!(keyset.is_expired(Utc::now()));
    assert!(keyset.verify_signature(&root.public_key_base64()));

    let mut store = TrustStore::new();
    let err = store
        .apply_keyset(&keyset, &root.public_key_base64(), Utc::now())
        .unwrap_err();
    assert!(matches!(err, GateError::KeysetRejected(_)));
    assert!(store.is_empty());
}

#[test]
fn keyset_signed_by_other_root_is_rejected() {
    let skill = SignedSkill::new();
    let root = TestSigner::new("root");
    let impostor = TestSigner::new("impostor");
    let bytes = publish(&impostor, keyset_with(&skill, Duration::days(1)));
    let keyset = codec::decode_keyset(&bytes).unwrap();

    let mut store = TrustStore::new();
    let err = store
        .apply_keyset(&keyset, &root.public_key_base64(), Utc::now())
        .unwrap_err();
    assert!(matches!(err, GateError::KeysetRejected(_)));
    assert!(store.is_empty());
}

#[test]
fn keyset_revocation_blocks_later_installs() {
    let skill = SignedSkill::new();
    let root = TestSigner::new("root");
    let mut store = skill.store.clone();

    let mut keyset = keyset_with(&skill, Duration::days(1));
    keyset.keys.clear();
    keyset.revoked_key_ids.push(skill.signer.key_id().to_string());
    let keyset = codec::decode_keyset(&publish(&root, keyset)).unwrap();
    let merge = store
        .apply_keyset(&keyset, &root.public_key_base64(), Utc::now())
        .unwrap();
    assert_eq!(merge.revoked, 1);

    let err = ArchiveInstaller::new()
        .install(
            &skill.archive,
            &skill.fixture.target(TargetKind::Codex),
            Some(&skill.manifest),
            &store,
            &strict(),
        )
        .unwrap_err();
    assert!(matches!(err, GateError::VerificationFailed { .. }));
}
