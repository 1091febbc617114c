use std::collections::BTreeSet;

use skillgate::error::LimitKind;
use skillgate::install::ArchiveInstaller;
use skillgate::target::TargetKind;
use skillgate::test_utils::{SkillArchiveBuilder, TestLogger, TestSigner};
use skillgate::trust::{TrustStore, TrustedKey};
use skillgate::verify::{ArtifactManifest, VerificationLimits, VerificationMode, VerificationPolicy};
use skillgate::GateError;

use crate::fixture::{SignedSkill, demo_archive, permissive, strict, visible_entries};

#[test]
fn signed_archive_installs_in_strict_mode() {
    let log = TestLogger::new("signed_archive_installs_in_strict_mode");
    let skill = SignedSkill::new();
    let target = skill.fixture.target(TargetKind::Claude);

    log.step("install signed archive");
    let result = ArchiveInstaller::new()
        .install(&skill.archive, &target, Some(&skill.manifest), &skill.store, &strict())
        .unwrap();
    log.log_actual(&result);

    assert_eq!(result.verification_mode, VerificationMode::Strict);
    assert_eq!(result.skill_directory, target.root().join("demo"));
    assert_eq!(result.files_copied, 2);
    assert_eq!(result.archive_sha256.as_deref(), Some(skill.manifest.sha256.as_str()));
    assert!(result.content_sha256.is_some());
    assert!(result.backup_path.is_none());

    log.step("check destination tree");
    assert!(result.skill_directory.join("SKILL.md").is_file());
    assert!(result.skill_directory.join("scripts/run.sh").is_file());
    assert_eq!(visible_entries(target.root()), vec!["demo".to_string()]);
    log.pass();
}

#[test]
fn second_install_without_overwrite_fails() {
    let skill = SignedSkill::new();
    let target = skill.fixture.target(TargetKind::Codex);
    let installer = ArchiveInstaller::new();

    installer
        .install(&skill.archive, &target, Some(&skill.manifest), &skill.store, &strict())
        .unwrap();
    let err = installer
        .install(&skill.archive, &target, Some(&skill.manifest), &skill.store, &strict())
        .unwrap_err();

    assert!(matches!(err, GateError::DestinationExists(ref path) if path.ends_with("demo")));
    assert_eq!(visible_entries(target.root()), vec!["demo".to_string()]);
}

#[test]
fn overwrite_replaces_content_completely() {
    let log = TestLogger::new("overwrite_replaces_content_completely");
    let skill = SignedSkill::with_archive(
        demo_archive("First version.").file("demo/old-only.txt", b"stale"),
    );
    let target = skill.fixture.target(TargetKind::Codex);
    let installer = ArchiveInstaller::new();

    log.step("install first version");
    let first = installer
        .install(&skill.archive, &target, Some(&skill.manifest), &skill.store, &strict())
        .unwrap();
    assert!(first.skill_directory.join("old-only.txt").exists());

    log.step("overwrite with second version");
    let (archive, manifest) = skill.sign_archive("demo-v2.zip", &demo_archive("Second version."));
    let second = installer
        .install(
            &archive,
            &target,
            Some(&manifest),
            &skill.store,
            &strict().overwrite(true),
        )
        .unwrap();
    log.log_actual(&second);

    assert_ne!(first.content_sha256, second.content_sha256);
    assert!(!second.skill_directory.join("old-only.txt").exists());
    let text = std::fs::read_to_string(second.skill_directory.join("SKILL.md")).unwrap();
    assert!(text.contains("Second version."));
    assert_eq!(visible_entries(target.root()), vec!["demo".to_string()]);

    log.step("reinstall identical content reproduces the digest");
    let third = installer
        .install(
            &archive,
            &target,
            Some(&manifest),
            &skill.store,
            &strict().overwrite(true),
        )
        .unwrap();
    assert_eq!(second.content_sha256, third.content_sha256);
    log.pass();
}

#[test]
fn kept_backup_holds_previous_install() {
    let skill = SignedSkill::new();
    let target = skill.fixture.target(TargetKind::Copilot);
    let installer = ArchiveInstaller::new();
    installer
        .install(&skill.archive, &target, Some(&skill.manifest), &skill.store, &strict())
        .unwrap();

    let (archive, manifest) = skill.sign_archive("demo-v2.zip", &demo_archive("Replacement."));
    let result = installer
        .install(
            &archive,
            &target,
            Some(&manifest),
            &skill.store,
            &strict().overwrite(true).keep_backup(true),
        )
        .unwrap();

    let backup = result.backup_path.expect("backup kept");
    let old = std::fs::read_to_string(backup.join("SKILL.md")).unwrap();
    assert!(old.contains("Demo skill for tests."));
    assert_eq!(visible_entries(target.root()).len(), 2);
}

#[test]
fn checksum_mismatch_fails_in_every_mode() {
    let skill = SignedSkill::new();
    let target = skill.fixture.target(TargetKind::Codex);
    let mut manifest = skill.manifest.clone();
    manifest.sha256 = "a".repeat(64);

    for options in [strict(), permissive()] {
        let err = ArchiveInstaller::new()
            .install(&skill.archive, &target, Some(&manifest), &skill.store, &options)
            .unwrap_err();
        assert!(err.to_string().contains("Checksum mismatch"), "{err}");
        assert!(err.is_integrity_failure());
    }
    assert!(visible_entries(target.root()).is_empty());
}

#[test]
fn unsigned_manifest_installs_only_when_permissive() {
    let skill = SignedSkill::new();
    let target = skill.fixture.target(TargetKind::Codex);
    let manifest = ArtifactManifest::new(skill.manifest.sha256.clone());
    let installer = ArchiveInstaller::new();

    let err = installer
        .install(&skill.archive, &target, Some(&manifest), &skill.store, &strict())
        .unwrap_err();
    assert!(matches!(err, GateError::VerificationFailed { ref issues } if issues.iter().any(|i| i.contains("Signature missing"))));
    assert!(visible_entries(target.root()).is_empty());

    let result = installer
        .install(&skill.archive, &target, Some(&manifest), &skill.store, &permissive())
        .unwrap();
    assert_eq!(result.verification_mode, VerificationMode::Permissive);
}

#[test]
fn unknown_signer_is_rejected_in_strict_mode() {
    let skill = SignedSkill::new();
    let target = skill.fixture.target(TargetKind::Claude);
    let stranger = TestSigner::new("stranger");
    let manifest = stranger.manifest_for(&skill.archive);

    let err = ArchiveInstaller::new()
        .install(&skill.archive, &target, Some(&manifest), &skill.store, &strict())
        .unwrap_err();
    let GateError::VerificationFailed { issues } = err else {
        panic!("expected verification failure");
    };
    assert!(issues.iter().any(|i| i.contains("not trusted locally")));
}

#[test]
fn scoped_key_only_covers_its_packages() {
    let skill = SignedSkill::new();
    let target = skill.fixture.target(TargetKind::Codex);
    let scoped = TrustedKey::new(skill.signer.key_id(), skill.signer.public_key_base64())
        .scoped(["other-skill"]);
    let store = TrustStore::with_keys([scoped]).unwrap();
    let installer = ArchiveInstaller::new();

    let err = installer
        .install(
            &skill.archive,
            &target,
            Some(&skill.manifest),
            &store,
            &strict().scope("demo"),
        )
        .unwrap_err();
    assert!(matches!(err, GateError::VerificationFailed { .. }));

    let store = TrustStore::with_keys([TrustedKey::new(
        skill.signer.key_id(),
        skill.signer.public_key_base64(),
    )
    .scoped(["demo"])])
    .unwrap();
    installer
        .install(
            &skill.archive,
            &target,
            Some(&skill.manifest),
            &store,
            &strict().scope("demo"),
        )
        .unwrap();
}

#[test]
fn manifest_allowlist_and_revocation_are_hard_failures() {
    let skill = SignedSkill::new();
    let target = skill.fixture.target(TargetKind::Codex);
    let installer = ArchiveInstaller::new();

    let mut allowlisted = skill.manifest.clone();
    allowlisted.trusted_signers = Some(BTreeSet::from(["someone-else".to_string()]));
    let err = installer
        .install(&skill.archive, &target, Some(&allowlisted), &skill.store, &permissive())
        .unwrap_err();
    assert!(matches!(err, GateError::SignerNotTrustedForScope(_)));

    let mut revoked = skill.manifest.clone();
    revoked.revoked_keys = Some(BTreeSet::from([skill.signer.key_id().to_string()]));
    let err = installer
        .install(&skill.archive, &target, Some(&revoked), &skill.store, &permissive())
        .unwrap_err();
    assert!(matches!(err, GateError::SignerRevoked(_)));
    assert!(visible_entries(target.root()).is_empty());
}

#[test]
fn file_count_limit_blocks_install() {
    let skill = SignedSkill::with_archive(
        demo_archive("Many files.")
            .file("demo/a.txt", b"a")
            .file("demo/b.txt", b"b"),
    );
    let target = skill.fixture.target(TargetKind::Codex);
    let limits = VerificationLimits {
        max_file_count: 3,
        ..VerificationLimits::default()
    };
    let mut options = strict();
    options.policy = VerificationPolicy::strict().with_limits(limits);

    let err = ArchiveInstaller::new()
        .install(&skill.archive, &target, Some(&skill.manifest), &skill.store, &options)
        .unwrap_err();
    assert!(matches!(err, GateError::LimitExceeded { kind: LimitKind::FileCount, .. }));
    assert!(visible_entries(target.root()).is_empty());
}

#[test]
fn extracted_size_limit_blocks_install() {
    let skill = SignedSkill::with_archive(demo_archive("Big.").file("demo/blob.bin", &[7u8; 4096]));
    let target = skill.fixture.target(TargetKind::Codex);
    let limits = VerificationLimits {
        max_extracted_bytes: 1024,
        ..VerificationLimits::default()
    };
    let mut options = strict();
    options.policy = VerificationPolicy::strict().with_limits(limits);

    let err = ArchiveInstaller::new()
        .install(&skill.archive, &target, Some(&skill.manifest), &skill.store, &options)
        .unwrap_err();
    assert!(matches!(err, GateError::LimitExceeded { kind: LimitKind::ExtractedBytes, .. }));
    assert!(visible_entries(target.root()).is_empty());
}

#[test]
fn symlink_entry_blocks_install() {
    let skill = SignedSkill::with_archive(
        demo_archive("Linky.").symlink("demo/escape", "../../etc/passwd"),
    );
    let target = skill.fixture.target(TargetKind::Codex);

    let err = ArchiveInstaller::new()
        .install(&skill.archive, &target, Some(&skill.manifest), &skill.store, &strict())
        .unwrap_err();
    assert!(matches!(err, GateError::LimitExceeded { kind: LimitKind::Symlink, .. }));
    assert!(visible_entries(target.root()).is_empty());
}

#[test]
fn archive_without_skill_file_is_rejected() {
    let skill = SignedSkill::with_archive(SkillArchiveBuilder::new().file("demo/README.md", b"hi"));
    let target = skill.fixture.target(TargetKind::Codex);

    let err = ArchiveInstaller::new()
        .install(&skill.archive, &target, Some(&skill.manifest), &skill.store, &strict())
        .unwrap_err();
    assert!(matches!(err, GateError::SkillRootMissing));
}

#[test]
fn claude_target_enforces_name_rules() {
    let skill = SignedSkill::with_archive(
        SkillArchiveBuilder::new().file(
            "demo/SKILL.md",
            b"---\nname: Not Valid Name\ndescription: Bad name.\n---\n",
        ),
    );
    let installer = ArchiveInstaller::new();

    let err = installer
        .install(
            &skill.archive,
            &skill.fixture.target(TargetKind::Claude),
            Some(&skill.manifest),
            &skill.store,
            &strict(),
        )
        .unwrap_err();
    assert!(matches!(err, GateError::ContentValidationFailed(_)));

    installer
        .install(
            &skill.archive,
            &skill.fixture.target(TargetKind::Codex),
            Some(&skill.manifest),
            &skill.store,
            &strict(),
        )
        .unwrap();
}

#[test]
fn temp_root_is_left_empty() {
    let skill = SignedSkill::new();
    let target = skill.fixture.target(TargetKind::Codex);
    let temp_root = skill.fixture.path("scratch");

    ArchiveInstaller::new()
        .with_temp_root(&temp_root)
        .install(&skill.archive, &target, Some(&skill.manifest), &skill.store, &strict())
        .unwrap();
    assert!(visible_entries(&temp_root).is_empty());
}
