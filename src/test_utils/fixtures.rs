use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::target::{InstallTarget, TargetKind};
use crate::trust::TrustedKey;
use crate::verify::{ArtifactManifest, sha256_file};

/// Test fixture providing an isolated filesystem with archive and target roots.
pub struct SkillFixture {
    pub temp_dir: TempDir,
    pub data_path: PathBuf,
}

impl SkillFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data_path = temp_dir.path().to_path_buf();

        println!("[FIXTURE] Created temp directory: {:?}", data_path);

        Self { temp_dir, data_path }
    }

    /// Path for an archive file inside the fixture.
    pub fn archive_path(&self, name: &str) -> PathBuf {
        self.data_path.join("downloads").join(name)
    }

    /// Install target rooted at `<fixture>/targets/<kind>`.
    pub fn target(&self, kind: TargetKind) -> InstallTarget {
        InstallTarget::new(kind, self.data_path.join("targets").join(kind.to_string()))
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.data_path.join(relative)
    }

    /// Create a file with content.
    pub fn create_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let full_path = self.data_path.join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
        println!(
            "[FIXTURE] Created file: {:?} ({} bytes)",
            full_path,
            content.len()
        );
        full_path
    }
}

impl Default for SkillFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SkillFixture {
    fn drop(&mut self) {
        println!("[FIXTURE] Cleaning up temp directory: {:?}", self.data_path);
    }
}

/// Minimal valid `SKILL.md` body.
pub fn skill_md(name: &str, description: &str) -> String {
    format!("---\nname: {name}\ndescription: {description}\n---\n\n# {name}\n\nUse this skill well.\n")
}

enum Entry {
    File(String, Vec<u8>),
    Dir(String),
    Symlink(String, String),
}

/// Builds real zip archives for tests.
#[derive(Default)]
pub struct SkillArchiveBuilder {
    entries: Vec<Entry>,
}

impl SkillArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `<name>/SKILL.md` with valid frontmatter.
    pub fn skill(self, name: &str, description: &str) -> Self {
        self.file(&format!("{name}/SKILL.md"), skill_md(name, description).as_bytes())
    }

    pub fn file(mut self, path: &str, bytes: &[u8]) -> Self {
        self.entries.push(Entry::File(path.to_string(), bytes.to_vec()));
        self
    }

    pub fn dir(mut self, path: &str) -> Self {
        self.entries.push(Entry::Dir(path.to_string()));
        self
    }

    pub fn symlink(mut self, path: &str, target: &str) -> Self {
        self.entries
            .push(Entry::Symlink(path.to_string(), target.to_string()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for entry in &self.entries {
            match entry {
                Entry::File(path, bytes) => {
                    zip.start_file(path.as_str(), options).expect("start zip entry");
                    zip.write_all(bytes).expect("write zip entry");
                }
                Entry::Dir(path) => {
                    zip.add_directory(path.as_str(), options).expect("add zip dir");
                }
                Entry::Symlink(path, target) => {
                    zip.add_symlink(path.as_str(), target.as_str(), options)
                        .expect("add zip symlink");
                }
            }
        }
        zip.finish().expect("finish zip").into_inner()
    }

    /// Write the archive to `path`, creating parents, and return the path.
    pub fn write_to(&self, path: &Path) -> PathBuf {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(path, self.build()).expect("Failed to write archive");
        path.to_path_buf()
    }
}

/// An Ed25519 signer with a fresh random key.
pub struct TestSigner {
    key_id: String,
    pair: Ed25519KeyPair,
}

impl TestSigner {
    pub fn new(key_id: &str) -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).expect("generate key");
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).expect("parse key");
        Self {
            key_id: key_id.to_string(),
            pair,
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(self.pair.public_key().as_ref())
    }

    /// Globally trusted key for this signer.
    pub fn trusted_key(&self) -> TrustedKey {
        TrustedKey::new(&self.key_id, self.public_key_base64())
    }

    pub fn sign_base64(&self, message: &[u8]) -> String {
        STANDARD.encode(self.pair.sign(message).as_ref())
    }

    /// Manifest with digest, size, and this signer's signature over the digest.
    pub fn manifest_for(&self, archive: &Path) -> ArtifactManifest {
        let digest = sha256_file(archive).expect("hash archive");
        let size = std::fs::metadata(archive).expect("stat archive").len();
        let signature = self.sign_base64(digest.as_bytes());
        ArtifactManifest::new(digest)
            .with_size(size)
            .signed(signature, &self.key_id)
    }
}
