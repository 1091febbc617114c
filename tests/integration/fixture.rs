use std::path::{Path, PathBuf};

use skillgate::install::InstallOptions;
use skillgate::test_utils::{SkillArchiveBuilder, SkillFixture, TestSigner};
use skillgate::trust::TrustStore;
use skillgate::verify::{ArtifactManifest, VerificationPolicy};

/// A fixture with one signer trusted globally and a signed `demo` archive.
pub struct SignedSkill {
    pub fixture: SkillFixture,
    pub signer: TestSigner,
    pub store: TrustStore,
    pub archive: PathBuf,
    pub manifest: ArtifactManifest,
}

impl SignedSkill {
    pub fn new() -> Self {
        Self::with_archive(demo_archive("Demo skill for tests."))
    }

    pub fn with_archive(builder: SkillArchiveBuilder) -> Self {
        let fixture = SkillFixture::new();
        let signer = TestSigner::new("publisher-1");
        let store = TrustStore::with_keys([signer.trusted_key()]).expect("trust store");
        let archive = builder.write_to(&fixture.archive_path("demo.zip"));
        let manifest = signer.manifest_for(&archive);
        Self {
            fixture,
            signer,
            store,
            archive,
            manifest,
        }
    }

    /// Write another archive next to the first and sign it with the same key.
    pub fn sign_archive(&self, file_name: &str, builder: &SkillArchiveBuilder) -> (PathBuf, ArtifactManifest) {
        let archive = builder.write_to(&self.fixture.archive_path(file_name));
        let manifest = self.signer.manifest_for(&archive);
        (archive, manifest)
    }
}

pub fn demo_archive(description: &str) -> SkillArchiveBuilder {
    SkillArchiveBuilder::new()
        .skill("demo", description)
        .file("demo/scripts/run.sh", b"#!/bin/sh\necho demo\n")
}

pub fn strict() -> InstallOptions {
    InstallOptions::new(VerificationPolicy::strict())
}

pub fn permissive() -> InstallOptions {
    InstallOptions::new(VerificationPolicy::permissive())
}

/// Entry names under `root`, ignoring per-destination lock files.
pub fn visible_entries(root: &Path) -> Vec<String> {
    let Ok(read) = std::fs::read_dir(root) else {
        return Vec::new();
    };
    let mut names: Vec<String> = read
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| !name.ends_with(".lock"))
        .collect();
    names.sort();
    names
}
