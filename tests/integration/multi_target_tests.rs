use std::sync::atomic::{AtomicBool, Ordering};

use skillgate::install::{
    ArchiveInstaller, InstallResult, MultiTargetInstaller, PostInstallValidator,
};
use skillgate::install::multi::TARGET_NOT_SUPPORTED;
use skillgate::target::{InstallTarget, TargetKind};
use skillgate::test_utils::TestLogger;
use skillgate::GateError;

use crate::fixture::{SignedSkill, strict, visible_entries};

/// Rejects one target kind; optionally only on the first attempt.
struct RejectOnce {
    kind: TargetKind,
    armed: AtomicBool,
    once: bool,
}

impl RejectOnce {
    fn always(kind: TargetKind) -> Self {
        Self {
            kind,
            armed: AtomicBool::new(true),
            once: false,
        }
    }

    fn once(kind: TargetKind) -> Self {
        Self {
            kind,
            armed: AtomicBool::new(true),
            once: true,
        }
    }
}

impl PostInstallValidator for RejectOnce {
    fn validate(&self, _result: &InstallResult, target: &InstallTarget) -> Option<String> {
        if target.kind() != self.kind {
            return None;
        }
        let armed = if self.once {
            self.armed.swap(false, Ordering::SeqCst)
        } else {
            self.armed.load(Ordering::SeqCst)
        };
        armed.then(|| format!("{} hook rejected install", self.kind))
    }
}

fn three_targets(skill: &SignedSkill) -> Vec<InstallTarget> {
    vec![
        skill.fixture.target(TargetKind::Codex),
        skill.fixture.target(TargetKind::Claude),
        skill.fixture.target(TargetKind::Copilot),
    ]
}

#[test]
fn failed_hook_on_one_target_leaves_others_installed() {
    let log = TestLogger::new("failed_hook_on_one_target_leaves_others_installed");
    let skill = SignedSkill::new();
    let targets = three_targets(&skill);
    let multi = MultiTargetInstaller::new(ArchiveInstaller::new())
        .with_validator(RejectOnce::always(TargetKind::Claude));

    log.step("install into codex, claude, copilot");
    let outcome = multi
        .install(&skill.archive, &targets, Some(&skill.manifest), &skill.store, &strict())
        .unwrap();
    log.log_actual(&outcome);

    assert_eq!(
        outcome.successes.keys().copied().collect::<Vec<_>>(),
        vec![TargetKind::Codex, TargetKind::Copilot]
    );
    assert_eq!(
        outcome.failures.keys().copied().collect::<Vec<_>>(),
        vec![TargetKind::Claude]
    );
    assert!(outcome.failures[&TargetKind::Claude].starts_with("Validation failed"));
    assert!(!outcome.did_rollback);
    assert!(!outcome.is_complete());

    log.step("successful targets are intact");
    for kind in [TargetKind::Codex, TargetKind::Copilot] {
        let installed = &outcome.successes[&kind];
        assert!(installed.skill_directory.join("SKILL.md").is_file());
        assert_eq!(
            visible_entries(skill.fixture.target(kind).root()),
            vec!["demo".to_string()]
        );
    }
    log.pass();
}

#[test]
fn parallel_install_matches_sequential() {
    let skill = SignedSkill::new();
    let targets = three_targets(&skill);
    let multi = MultiTargetInstaller::new(ArchiveInstaller::new()).parallel(true);

    let outcome = multi
        .install(&skill.archive, &targets, Some(&skill.manifest), &skill.store, &strict())
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.successes.len(), 3);
    let digests: Vec<_> = outcome
        .successes
        .values()
        .map(|r| r.content_sha256.clone())
        .collect();
    assert!(digests.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn manifest_target_list_filters_targets() {
    let skill = SignedSkill::new();
    let targets = three_targets(&skill);
    let manifest = skill
        .manifest
        .clone()
        .with_targets([TargetKind::Codex, TargetKind::Copilot]);

    let outcome = MultiTargetInstaller::default()
        .install(&skill.archive, &targets, Some(&manifest), &skill.store, &strict())
        .unwrap();

    assert_eq!(outcome.failures[&TargetKind::Claude], TARGET_NOT_SUPPORTED);
    assert!(visible_entries(skill.fixture.target(TargetKind::Claude).root()).is_empty());
    assert_eq!(outcome.successes.len(), 2);
}

#[test]
fn repeated_target_kind_is_rejected_up_front() {
    let skill = SignedSkill::new();
    let codex = skill.fixture.target(TargetKind::Codex);
    let other_codex = InstallTarget::new(TargetKind::Codex, skill.fixture.path("elsewhere"));

    let err = MultiTargetInstaller::default()
        .install(
            &skill.archive,
            &[codex.clone(), other_codex],
            Some(&skill.manifest),
            &skill.store,
            &strict(),
        )
        .unwrap_err();

    assert!(matches!(err, GateError::DuplicateTarget(TargetKind::Codex)));
    assert!(visible_entries(codex.root()).is_empty());
}

#[test]
fn retry_reruns_only_failed_targets() {
    let log = TestLogger::new("retry_reruns_only_failed_targets");
    let skill = SignedSkill::new();
    let targets = three_targets(&skill);
    let multi = MultiTargetInstaller::new(ArchiveInstaller::new())
        .with_validator(RejectOnce::once(TargetKind::Claude));

    log.step("first attempt fails on claude");
    let first = multi
        .install(&skill.archive, &targets, Some(&skill.manifest), &skill.store, &strict())
        .unwrap();
    assert_eq!(first.failures.len(), 1);
    let codex_before = first.successes[&TargetKind::Codex].clone();

    log.step("retry without overwrite hits the placed files");
    let blocked = multi
        .retry_failed(&first, &skill.archive, &targets, Some(&skill.manifest), &skill.store, &strict())
        .unwrap();
    assert!(blocked.failures[&TargetKind::Claude].contains("already exists"));

    log.step("retry with overwrite completes");
    let retried = multi
        .retry_failed(
            &blocked,
            &skill.archive,
            &targets,
            Some(&skill.manifest),
            &skill.store,
            &strict().overwrite(true),
        )
        .unwrap();
    log.log_actual(&retried);

    assert!(retried.is_complete());
    assert_eq!(retried.successes.len(), 3);
    assert_eq!(retried.successes[&TargetKind::Codex], codex_before);
    log.pass();
}
