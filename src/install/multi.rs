//! Best-effort fan-out of one archive to several target roots.
//!
//! Each target is installed independently. A failure is recorded against its
//! target kind and neither stops the remaining targets nor undoes targets that
//! already succeeded, so `did_rollback` is always false. Callers should treat
//! the result as eventually consistent and use
//! [`MultiTargetInstaller::retry_failed`] to converge.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{GateError, Result};
use crate::install::content::SKILL_FILE;
use crate::install::installer::{ArchiveInstaller, InstallOptions, InstallResult};
use crate::target::{InstallTarget, TargetKind};
use crate::trust::TrustStore;
use crate::verify::ArtifactManifest;

pub const TARGET_NOT_SUPPORTED: &str = "Target not supported by manifest";

/// Hook run after a target's files are in place.
///
/// Returning `Some(reason)` marks that target as failed.
pub trait PostInstallValidator: Send + Sync {
    fn validate(&self, result: &InstallResult, target: &InstallTarget) -> Option<String>;
}

/// Checks that the installed directory still holds its entry file.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPostInstallValidator;

impl PostInstallValidator for DefaultPostInstallValidator {
    fn validate(&self, result: &InstallResult, _target: &InstallTarget) -> Option<String> {
        let skill_file = result.skill_directory.join(SKILL_FILE);
        match std::fs::read_to_string(&skill_file) {
            Ok(_) => None,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Some(format!("{SKILL_FILE} not found"))
            }
            Err(err) => Some(format!("{SKILL_FILE} unreadable: {err}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiTargetOutcome {
    pub successes: BTreeMap<TargetKind, InstallResult>,
    pub failures: BTreeMap<TargetKind, String>,
    /// Always false: successful targets are never undone.
    pub did_rollback: bool,
}

impl MultiTargetOutcome {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct MultiTargetInstaller {
    installer: ArchiveInstaller,
    validator: Box<dyn PostInstallValidator>,
    parallel: bool,
}

impl std::fmt::Debug for MultiTargetInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiTargetInstaller")
            .field("installer", &self.installer)
            .field("parallel", &self.parallel)
            .finish_non_exhaustive()
    }
}

impl Default for MultiTargetInstaller {
    fn default() -> Self {
        Self::new(ArchiveInstaller::new())
    }
}

impl MultiTargetInstaller {
    #[must_use]
    pub fn new(installer: ArchiveInstaller) -> Self {
        Self {
            installer,
            validator: Box::new(DefaultPostInstallValidator),
            parallel: false,
        }
    }

    #[must_use]
    pub fn with_validator(mut self, validator: impl PostInstallValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Install targets concurrently on the rayon pool.
    #[must_use]
    pub const fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Install into every target. Only a repeated target kind is an error;
    /// per-target failures land in the outcome.
    pub fn install(
        &self,
        archive: &std::path::Path,
        targets: &[InstallTarget],
        manifest: Option<&ArtifactManifest>,
        trust_store: &TrustStore,
        options: &InstallOptions,
    ) -> Result<MultiTargetOutcome> {
        let mut seen = BTreeSet::new();
        for target in targets {
            if !seen.insert(target.kind()) {
                return Err(GateError::DuplicateTarget(target.kind()));
            }
        }

        let run = |target: &InstallTarget| {
            (
                target.kind(),
                self.install_one(archive, target, manifest, trust_store, options),
            )
        };
        let results: Vec<(TargetKind, std::result::Result<InstallResult, String>)> =
            if self.parallel {
                targets.par_iter().map(run).collect()
            } else {
                targets.iter().map(run).collect()
            };

        let mut outcome = MultiTargetOutcome::default();
        for (kind, result) in results {
            match result {
                Ok(installed) => {
                    outcome.successes.insert(kind, installed);
                }
                Err(reason) => {
                    warn!(target = %kind, reason = %reason, "target install failed");
                    outcome.failures.insert(kind, reason);
                }
            }
        }
        info!(
            archive = %archive.display(),
            succeeded = outcome.successes.len(),
            failed = outcome.failures.len(),
            "multi-target install finished"
        );
        Ok(outcome)
    }

    /// Re-run only the targets that failed in `previous`.
    ///
    /// Earlier successes are carried over untouched; failures reflect the new
    /// attempt only. A target rejected after its files were placed still has
    /// them on disk, so retrying it needs `options.overwrite`.
    pub fn retry_failed(
        &self,
        previous: &MultiTargetOutcome,
        archive: &std::path::Path,
        targets: &[InstallTarget],
        manifest: Option<&ArtifactManifest>,
        trust_store: &TrustStore,
        options: &InstallOptions,
    ) -> Result<MultiTargetOutcome> {
        let pending: Vec<InstallTarget> = targets
            .iter()
            .filter(|t| previous.failures.contains_key(&t.kind()))
            .cloned()
            .collect();
        let mut outcome = self.install(archive, &pending, manifest, trust_store, options)?;
        for (kind, result) in &previous.successes {
            outcome.successes.entry(*kind).or_insert_with(|| result.clone());
        }
        Ok(outcome)
    }

    fn install_one(
        &self,
        archive: &std::path::Path,
        target: &InstallTarget,
        manifest: Option<&ArtifactManifest>,
        trust_store: &TrustStore,
        options: &InstallOptions,
    ) -> std::result::Result<InstallResult, String> {
        if let Some(manifest) = manifest {
            if !manifest.supports_target(target.kind()) {
                return Err(TARGET_NOT_SUPPORTED.to_string());
            }
        }
        let result = self
            .installer
            .install(archive, target, manifest, trust_store, options)
            .map_err(|err| err.to_string())?;
        if let Some(reason) = self.validator.validate(&result, target) {
            return Err(GateError::ContentValidationFailed(reason).to_string());
        }
        Ok(result)
    }
}
