//! Verification policy: how strictly soft issues are treated and what
//! resource limits apply to an archive.

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// Default cap on archive size (50 MiB).
pub const DEFAULT_MAX_ARCHIVE_BYTES: u64 = 50 * 1024 * 1024;
/// Default cap on total extracted size (50 MiB).
pub const DEFAULT_MAX_EXTRACTED_BYTES: u64 = 50 * 1024 * 1024;
/// Default cap on extracted file count.
pub const DEFAULT_MAX_FILE_COUNT: usize = 2000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    /// Any soft issue fails verification.
    #[default]
    Strict,
    /// Soft issues are reported in the outcome; only hard failures error.
    Permissive,
}

impl std::fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Permissive => write!(f, "permissive"),
        }
    }
}

impl std::str::FromStr for VerificationMode {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            _ => Err(GateError::Config(format!(
                "invalid verification mode: {s} (expected strict or permissive)"
            ))),
        }
    }
}

/// Resource ceilings applied before and during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationLimits {
    pub max_archive_bytes: u64,
    pub max_extracted_bytes: u64,
    pub max_file_count: usize,
}

impl Default for VerificationLimits {
    fn default() -> Self {
        Self {
            max_archive_bytes: DEFAULT_MAX_ARCHIVE_BYTES,
            max_extracted_bytes: DEFAULT_MAX_EXTRACTED_BYTES,
            max_file_count: DEFAULT_MAX_FILE_COUNT,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationPolicy {
    pub mode: VerificationMode,
    pub limits: VerificationLimits,
}

impl VerificationPolicy {
    #[must_use]
    pub fn strict() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn permissive() -> Self {
        Self {
            mode: VerificationMode::Permissive,
            limits: VerificationLimits::default(),
        }
    }

    #[must_use]
    pub const fn with_limits(mut self, limits: VerificationLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub const fn is_strict(&self) -> bool {
        matches!(self.mode, VerificationMode::Strict)
    }
}
