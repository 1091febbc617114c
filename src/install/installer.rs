//! Single-target skill installation.
//!
//! `install` runs a fixed sequence: verify, extract into a private temp
//! directory, locate the skill root, enforce limits, validate content, stage
//! next to the destination, back up any existing install, swap the staged
//! directory into place, then clean up. Only the swap can leave the
//! destination half-mutated, so only the swap has a rollback.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::{GateError, Result};
use crate::install::archive::{count_error, extract_archive, size_error};
use crate::install::content::{ContentValidator, SKILL_FILE, SkillMdValidator};
use crate::install::digest::{content_sha256, directory_stats};
use crate::install::lock::DestinationLock;
use crate::target::InstallTarget;
use crate::trust::TrustStore;
use crate::utils::fs::{ensure_dir, move_dir, unique_sibling};
use crate::verify::{
    ArtifactManifest, ArtifactVerifier, VerificationLimits, VerificationMode, VerificationPolicy,
    sha256_file,
};

/// Per-call install settings.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Replace an existing install of the same skill.
    pub overwrite: bool,
    pub policy: VerificationPolicy,
    /// Package identifier used to scope trusted keys.
    pub scope_slug: Option<String>,
    /// Keep the previous install as a `.backup-*` sibling instead of deleting it.
    pub keep_backup: bool,
}

impl InstallOptions {
    #[must_use]
    pub fn new(policy: VerificationPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    #[must_use]
    pub fn scope(mut self, slug: impl Into<String>) -> Self {
        self.scope_slug = Some(slug.into());
        self
    }

    #[must_use]
    pub const fn keep_backup(mut self, keep: bool) -> Self {
        self.keep_backup = keep;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallResult {
    pub verification_mode: VerificationMode,
    pub skill_directory: PathBuf,
    pub files_copied: usize,
    pub total_bytes: u64,
    #[serde(rename = "archiveSHA256")]
    pub archive_sha256: Option<String>,
    #[serde(rename = "contentSHA256")]
    pub content_sha256: Option<String>,
    /// Present only when the previous install was kept.
    pub backup_path: Option<PathBuf>,
}

/// Installs one archive into one target root.
pub struct ArchiveInstaller {
    verifier: ArtifactVerifier,
    content_validator: Box<dyn ContentValidator>,
    temp_root: Option<PathBuf>,
}

impl std::fmt::Debug for ArchiveInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveInstaller")
            .field("temp_root", &self.temp_root)
            .finish_non_exhaustive()
    }
}

impl Default for ArchiveInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveInstaller {
    #[must_use]
    pub fn new() -> Self {
        Self {
            verifier: ArtifactVerifier::new(),
            content_validator: Box::new(SkillMdValidator),
            temp_root: None,
        }
    }

    #[must_use]
    pub fn with_content_validator(mut self, validator: impl ContentValidator + 'static) -> Self {
        self.content_validator = Box::new(validator);
        self
    }

    /// Extract under `dir` instead of the OS temp directory.
    #[must_use]
    pub fn with_temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(dir.into());
        self
    }

    pub fn install(
        &self,
        archive: &Path,
        target: &InstallTarget,
        manifest: Option<&ArtifactManifest>,
        trust_store: &TrustStore,
        options: &InstallOptions,
    ) -> Result<InstallResult> {
        let policy = &options.policy;
        let outcome = self.verifier.verify(
            archive,
            manifest,
            policy,
            trust_store,
            options.scope_slug.as_deref(),
        )?;
        debug!(archive = %archive.display(), target = %target.kind(), "verified archive");

        let workspace = self.workspace()?;
        extract_archive(archive, workspace.path(), &policy.limits)?;
        let skill_root = locate_skill_root(workspace.path())?;
        enforce_limits(&skill_root, &policy.limits)?;

        let dir_name = skill_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or(GateError::SkillRootMissing)?;
        self.validate_content(&skill_root, &dir_name, target)?;

        ensure_dir(target.root())?;
        let destination = target.root().join(&dir_name);
        let _lock = DestinationLock::acquire(&destination)?;

        let existed = destination.symlink_metadata().is_ok();
        if existed && !options.overwrite {
            return Err(GateError::DestinationExists(destination));
        }

        let staging = unique_sibling(&destination, ".install-");
        move_dir(&skill_root, &staging)?;
        debug!(staging = %staging.display(), "staged skill");

        let backup = if existed {
            let backup = unique_sibling(&destination, ".backup-");
            if let Err(err) = std::fs::rename(&destination, &backup) {
                remove_quietly(&staging);
                return Err(GateError::IoFailure {
                    reason: format!("back up {}: {err}", destination.display()),
                    rollback: None,
                });
            }
            Some(backup)
        } else {
            None
        };

        swap_into_place(&staging, &destination, backup.as_deref())?;

        let backup_path = match backup {
            Some(backup) if options.keep_backup => Some(backup),
            Some(backup) => {
                remove_quietly(&backup);
                None
            }
            None => None,
        };
        if let Err(err) = workspace.close() {
            warn!(error = %err, "failed to remove extraction directory");
        }

        let stats = directory_stats(&destination).unwrap_or_else(|err| {
            warn!(error = %err, "failed to measure installed skill");
            Default::default()
        });
        let result = InstallResult {
            verification_mode: outcome.mode,
            files_copied: stats.files,
            total_bytes: stats.bytes,
            archive_sha256: sha256_file(archive)
                .map_err(|err| warn!(error = %err, "failed to hash archive"))
                .ok(),
            content_sha256: content_sha256(&destination)
                .map_err(|err| warn!(error = %err, "failed to hash installed content"))
                .ok(),
            skill_directory: destination,
            backup_path,
        };
        info!(
            skill = %dir_name,
            target = %target.kind(),
            destination = %result.skill_directory.display(),
            files = result.files_copied,
            bytes = result.total_bytes,
            replaced = existed,
            "installed skill"
        );
        Ok(result)
    }

    fn workspace(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("skill-install-");
        let dir = match &self.temp_root {
            Some(root) => {
                ensure_dir(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    fn validate_content(&self, skill_root: &Path, dir_name: &str, target: &InstallTarget) -> Result<()> {
        let skill_file = skill_root.join(SKILL_FILE);
        let text = std::fs::read_to_string(&skill_file).map_err(|err| {
            GateError::ContentValidationFailed(format!("{SKILL_FILE} is not readable text: {err}"))
        })?;

        let findings = self.content_validator.validate(&text, dir_name, target.kind());
        for finding in findings.iter().filter(|f| !f.is_error()) {
            warn!(skill = dir_name, message = %finding.message, "skill content warning");
        }
        match findings.into_iter().find(|f| f.is_error()) {
            Some(blocking) => Err(GateError::ContentValidationFailed(blocking.message)),
            None => Ok(()),
        }
    }
}

/// The single top-level directory that holds the skill entry file.
pub fn locate_skill_root(extract_root: &Path) -> Result<PathBuf> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(extract_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path();
        if path.join(SKILL_FILE).is_file() {
            candidates.push(path);
        }
    }
    candidates.sort();

    match candidates.len() {
        0 => Err(GateError::SkillRootMissing),
        1 => Ok(candidates.remove(0)),
        _ => Err(GateError::SkillRootAmbiguous {
            candidates: candidates
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect(),
        }),
    }
}

/// Refuse a located root that is too large, has too many files, or holds a
/// symlink. Runs before anything moves toward the destination.
pub fn enforce_limits(root: &Path, limits: &VerificationLimits) -> Result<()> {
    let stats = directory_stats(root)?;
    if stats.bytes > limits.max_extracted_bytes {
        return Err(size_error(stats.bytes, limits.max_extracted_bytes));
    }
    if stats.files > limits.max_file_count {
        return Err(count_error(stats.files, limits.max_file_count));
    }
    Ok(())
}

/// Rename `staging` onto `destination`, which must already be vacated.
///
/// When the rename fails and the previous install was moved to `backup`, the
/// backup is renamed back. The returned `IoFailure` carries the restore error
/// too if that also failed.
pub(crate) fn swap_into_place(staging: &Path, destination: &Path, backup: Option<&Path>) -> Result<()> {
    let Err(err) = std::fs::rename(staging, destination) else {
        return Ok(());
    };
    let rollback = backup.and_then(|backup| {
        std::fs::rename(backup, destination)
            .err()
            .map(|rollback_err| format!("restore {}: {rollback_err}", backup.display()))
    });
    if staging.exists() {
        remove_quietly(staging);
    }
    warn!(
        destination = %destination.display(),
        error = %err,
        rollback_error = ?rollback,
        "atomic replace failed"
    );
    Err(GateError::IoFailure {
        reason: format!("move into {}: {err}", destination.display()),
        rollback,
    })
}

fn remove_quietly(path: &Path) {
    if let Err(err) = std::fs::remove_dir_all(path) {
        warn!(path = %path.display(), error = %err, "cleanup failed");
    }
}
