use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};
use crate::install::{ArchiveInstaller, InstallOptions, MultiTargetInstaller};
use crate::target::{InstallTarget, TargetKind};
use crate::trust::{Keyset, KeysetMerge, TrustStore, TrustStorePersistence, TrustedKey};
use crate::verify::policy::{
    DEFAULT_MAX_ARCHIVE_BYTES, DEFAULT_MAX_EXTRACTED_BYTES, DEFAULT_MAX_FILE_COUNT,
};
use crate::verify::{VerificationLimits, VerificationMode, VerificationPolicy};

const APP_DIR: &str = "skillgate";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub trust: TrustConfig,
    #[serde(default)]
    pub install: InstallConfig,
    #[serde(default)]
    pub targets: TargetsConfig,
}

impl Config {
    /// Defaults, then one TOML patch, then `SKILLGATE_*` environment overrides.
    ///
    /// The patch comes from `explicit_path`, else `SKILLGATE_CONFIG`, else
    /// `<config_dir>/skillgate/config.toml`. A missing file is not an error.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("SKILLGATE_CONFIG").ok().map(PathBuf::from));

        let patch = match explicit {
            Some(path) => Self::load_patch(&path)?,
            None => Self::load_global()?,
        };
        if let Some(patch) = patch {
            config.merge_patch(patch)?;
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(key) = &self.trust.keyset_root_key {
            TrustedKey::new("root", key.as_str())
                .public_key_bytes()
                .map_err(|err| GateError::Config(format!("trust.keyset_root_key: {err}")))?;
        }
        Ok(())
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        match dirs::config_dir() {
            Some(dir) => Self::load_patch(&dir.join(APP_DIR).join("config.toml")),
            None => Ok(None),
        }
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| GateError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| GateError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) -> Result<()> {
        if let Some(patch) = patch.verification {
            self.verification.merge(patch)?;
        }
        if let Some(patch) = patch.trust {
            self.trust.merge(patch);
        }
        if let Some(patch) = patch.install {
            self.install.merge(patch);
        }
        if let Some(patch) = patch.targets {
            self.targets.merge(patch);
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_string("SKILLGATE_VERIFICATION_MODE") {
            self.verification.mode = value.parse()?;
        }
        if let Some(value) = env_u64("SKILLGATE_MAX_ARCHIVE_BYTES")? {
            self.verification.max_archive_bytes = value;
        }
        if let Some(value) = env_u64("SKILLGATE_MAX_EXTRACTED_BYTES")? {
            self.verification.max_extracted_bytes = value;
        }
        if let Some(value) = env_usize("SKILLGATE_MAX_FILE_COUNT")? {
            self.verification.max_file_count = value;
        }

        if let Some(value) = env_string("SKILLGATE_TRUST_STORE") {
            self.trust.store_path = Some(PathBuf::from(value));
        }
        if let Some(value) = env_string("SKILLGATE_LEGACY_TRUST_STORE") {
            self.trust.legacy_store_path = Some(PathBuf::from(value));
        }
        if let Some(value) = env_string("SKILLGATE_KEYSET_ROOT_KEY") {
            self.trust.keyset_root_key = Some(value);
        }

        if let Some(value) = env_bool("SKILLGATE_PARALLEL_TARGETS")? {
            self.install.parallel_targets = value;
        }
        if let Some(value) = env_bool("SKILLGATE_KEEP_BACKUP")? {
            self.install.keep_backup = value;
        }

        Ok(())
    }

    #[must_use]
    pub const fn policy(&self) -> VerificationPolicy {
        VerificationPolicy {
            mode: self.verification.mode,
            limits: VerificationLimits {
                max_archive_bytes: self.verification.max_archive_bytes,
                max_extracted_bytes: self.verification.max_extracted_bytes,
                max_file_count: self.verification.max_file_count,
            },
        }
    }

    /// Every target with a resolvable root, in `TargetKind::ALL` order.
    #[must_use]
    pub fn install_targets(&self) -> Vec<InstallTarget> {
        TargetKind::ALL
            .iter()
            .filter_map(|&kind| {
                self.targets
                    .root_for(kind)
                    .map(|root| InstallTarget::new(kind, root))
            })
            .collect()
    }

    /// Persistence for the configured trust store and its legacy predecessor.
    pub fn persistence(&self) -> Result<TrustStorePersistence> {
        let store_path = match &self.trust.store_path {
            Some(path) => path.clone(),
            None => default_config_path("trust.json")?,
        };
        let legacy_path = match &self.trust.legacy_store_path {
            Some(path) => path.clone(),
            None => default_config_path("legacy/trust.json")?,
        };
        Ok(TrustStorePersistence::new(store_path).with_legacy_path(legacy_path))
    }

    /// Merge a published keyset into `store` under the configured root key.
    pub fn apply_keyset(
        &self,
        store: &mut TrustStore,
        keyset: &Keyset,
        now: DateTime<Utc>,
    ) -> Result<KeysetMerge> {
        let root = self.trust.keyset_root_key.as_deref().ok_or_else(|| {
            GateError::Config("trust.keyset_root_key is not configured".to_string())
        })?;
        store.apply_keyset(keyset, root, now)
    }

    #[must_use]
    pub fn install_options(&self) -> InstallOptions {
        InstallOptions::new(self.policy()).keep_backup(self.install.keep_backup)
    }

    #[must_use]
    pub fn installer(&self) -> ArchiveInstaller {
        let installer = ArchiveInstaller::new();
        match &self.install.temp_dir {
            Some(dir) => installer.with_temp_root(dir),
            None => installer,
        }
    }

    #[must_use]
    pub fn multi_installer(&self) -> MultiTargetInstaller {
        MultiTargetInstaller::new(self.installer()).parallel(self.install.parallel_targets)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    pub mode: VerificationMode,
    pub max_archive_bytes: u64,
    pub max_extracted_bytes: u64,
    pub max_file_count: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            mode: VerificationMode::Strict,
            max_archive_bytes: DEFAULT_MAX_ARCHIVE_BYTES,
            max_extracted_bytes: DEFAULT_MAX_EXTRACTED_BYTES,
            max_file_count: DEFAULT_MAX_FILE_COUNT,
        }
    }
}

impl VerificationConfig {
    fn merge(&mut self, patch: VerificationPatch) -> Result<()> {
        if let Some(value) = patch.mode {
            self.mode = value.parse()?;
        }
        if let Some(value) = patch.max_archive_bytes {
            self.max_archive_bytes = value;
        }
        if let Some(value) = patch.max_extracted_bytes {
            self.max_extracted_bytes = value;
        }
        if let Some(value) = patch.max_file_count {
            self.max_file_count = value;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Defaults to `<config_dir>/skillgate/trust.json`.
    pub store_path: Option<PathBuf>,
    pub legacy_store_path: Option<PathBuf>,
    /// Base64 Ed25519 key that signs keyset distributions.
    pub keyset_root_key: Option<String>,
}

impl TrustConfig {
    fn merge(&mut self, patch: TrustPatch) {
        if let Some(value) = patch.store_path {
            self.store_path = Some(value);
        }
        if let Some(value) = patch.legacy_store_path {
            self.legacy_store_path = Some(value);
        }
        if let Some(value) = patch.keyset_root_key {
            self.keyset_root_key = Some(value);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallConfig {
    pub parallel_targets: bool,
    pub keep_backup: bool,
    pub temp_dir: Option<PathBuf>,
}

impl InstallConfig {
    fn merge(&mut self, patch: InstallPatch) {
        if let Some(value) = patch.parallel_targets {
            self.parallel_targets = value;
        }
        if let Some(value) = patch.keep_backup {
            self.keep_backup = value;
        }
        if let Some(value) = patch.temp_dir {
            self.temp_dir = Some(value);
        }
    }
}

/// Explicit target roots. Unset roots fall back to `~/.<kind>/skills`,
/// except `custom`, which only exists when configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetsConfig {
    pub codex: Option<PathBuf>,
    pub claude: Option<PathBuf>,
    pub copilot: Option<PathBuf>,
    pub custom: Option<PathBuf>,
}

impl TargetsConfig {
    fn merge(&mut self, patch: TargetsPatch) {
        if let Some(value) = patch.codex {
            self.codex = Some(value);
        }
        if let Some(value) = patch.claude {
            self.claude = Some(value);
        }
        if let Some(value) = patch.copilot {
            self.copilot = Some(value);
        }
        if let Some(value) = patch.custom {
            self.custom = Some(value);
        }
    }

    #[must_use]
    pub fn root_for(&self, kind: TargetKind) -> Option<PathBuf> {
        let configured = match kind {
            TargetKind::Codex => &self.codex,
            TargetKind::Claude => &self.claude,
            TargetKind::Copilot => &self.copilot,
            TargetKind::Custom => &self.custom,
        };
        if let Some(path) = configured {
            return Some(expand_home(path));
        }
        match kind {
            TargetKind::Custom => None,
            _ => dirs::home_dir().map(|home| home.join(format!(".{kind}")).join("skills")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    pub verification: Option<VerificationPatch>,
    pub trust: Option<TrustPatch>,
    pub install: Option<InstallPatch>,
    pub targets: Option<TargetsPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct VerificationPatch {
    pub mode: Option<String>,
    pub max_archive_bytes: Option<u64>,
    pub max_extracted_bytes: Option<u64>,
    pub max_file_count: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TrustPatch {
    pub store_path: Option<PathBuf>,
    pub legacy_store_path: Option<PathBuf>,
    pub keyset_root_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct InstallPatch {
    pub parallel_targets: Option<bool>,
    pub keep_backup: Option<bool>,
    pub temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TargetsPatch {
    pub codex: Option<PathBuf>,
    pub claude: Option<PathBuf>,
    pub copilot: Option<PathBuf>,
    pub custom: Option<PathBuf>,
}

fn default_config_path(relative: &str) -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(relative))
        .ok_or_else(|| GateError::Config("config directory not found".to_string()))
}

fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_bool(key: &str) -> Result<Option<bool>> {
    match env_string(key) {
        Some(value) => match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(GateError::Config(format!("invalid {key} value {value}"))),
        },
        None => Ok(None),
    }
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match env_string(key) {
        Some(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|err| GateError::Config(format!("invalid {key} value {value}: {err}"))),
        None => Ok(None),
    }
}

fn env_usize(key: &str) -> Result<Option<usize>> {
    match env_string(key) {
        Some(value) => value
            .parse::<usize>()
            .map(Some)
            .map_err(|err| GateError::Config(format!("invalid {key} value {value}: {err}"))),
        None => Ok(None),
    }
}
