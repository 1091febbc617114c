//! Error handling for skillgate.
//!
//! This module provides:
//! - [`GateError`]: The main error enum for verification, extraction and install
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//! - [`StructuredError`]: Serializable error with code, suggestion and context

mod codes;

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use codes::ErrorCode;

use crate::target::TargetKind;

/// Which resource limit an archive violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    ArchiveBytes,
    ExtractedBytes,
    FileCount,
    Symlink,
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ArchiveBytes => write!(f, "archive size"),
            Self::ExtractedBytes => write!(f, "extracted size"),
            Self::FileCount => write!(f, "file count"),
            Self::Symlink => write!(f, "symlink"),
        }
    }
}

/// Main error type for skillgate operations.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Archive is unreadable: {0}")]
    ArchiveUnreadable(String),

    #[error("Failed to extract archive: {0}")]
    ExtractionFailed(String),

    #[error("No SKILL.md found in archive")]
    SkillRootMissing,

    #[error("Multiple skill roots detected; expected one (found {})", .candidates.join(", "))]
    SkillRootAmbiguous { candidates: Vec<String> },

    #[error("Limit exceeded ({kind}): {detail}")]
    LimitExceeded { kind: LimitKind, detail: String },

    #[error("Archive size mismatch: manifest declares {expected} bytes, archive has {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Signer not in trustedSigners: {0}")]
    SignerNotTrustedForScope(String),

    #[error("Signer is revoked: {0}")]
    SignerRevoked(String),

    /// Soft issues escalated under strict policy.
    #[error("Verification failed: {}", .issues.join("; "))]
    VerificationFailed { issues: Vec<String> },

    #[error("Validation failed: {0}")]
    ContentValidationFailed(String),

    #[error("Destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("I/O failure during replace: {reason}{}", .rollback.as_ref().map(|r| format!(" (rollback failed: {r})")).unwrap_or_default())]
    IoFailure {
        reason: String,
        rollback: Option<String>,
    },

    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Keyset rejected: {0}")]
    KeysetRejected(String),

    #[error("Target kind listed more than once: {0}")]
    DuplicateTarget(TargetKind),

    #[error("Lock failed: {0}")]
    LockFailed(String),
}

impl GateError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::SerializationError,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::ArchiveUnreadable(_) => ErrorCode::ArchiveUnreadable,
            Self::ExtractionFailed(_) => ErrorCode::ExtractionFailed,
            Self::SkillRootMissing => ErrorCode::SkillRootMissing,
            Self::SkillRootAmbiguous { .. } => ErrorCode::SkillRootAmbiguous,
            Self::LimitExceeded { .. } => ErrorCode::LimitExceeded,
            Self::SizeMismatch { .. } => ErrorCode::SizeMismatch,
            Self::ChecksumMismatch { .. } => ErrorCode::ChecksumMismatch,
            Self::SignerNotTrustedForScope(_) => ErrorCode::SignerNotTrusted,
            Self::SignerRevoked(_) => ErrorCode::SignerRevoked,
            Self::VerificationFailed { .. } => ErrorCode::VerificationFailed,
            Self::ContentValidationFailed(_) => ErrorCode::ContentInvalid,
            Self::DestinationExists(_) => ErrorCode::DestinationExists,
            Self::IoFailure { rollback: None, .. } => ErrorCode::ReplaceFailed,
            Self::IoFailure { rollback: Some(_), .. } => ErrorCode::RollbackFailed,
            Self::InvalidKey(_) => ErrorCode::InvalidKey,
            Self::Decode(_) => ErrorCode::DecodeFailed,
            Self::KeysetRejected(_) => ErrorCode::KeysetRejected,
            Self::DuplicateTarget(_) => ErrorCode::DuplicateTarget,
            Self::LockFailed(_) => ErrorCode::LockFailed,
        }
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::SkillRootAmbiguous { candidates } => {
                Some(serde_json::json!({ "candidates": candidates }))
            }
            Self::LimitExceeded { kind, detail } => {
                Some(serde_json::json!({ "limit": kind, "detail": detail }))
            }
            Self::SizeMismatch { expected, actual } => {
                Some(serde_json::json!({ "expected": expected, "actual": actual }))
            }
            Self::ChecksumMismatch { expected, actual } => {
                Some(serde_json::json!({ "expected": expected, "actual": actual }))
            }
            Self::SignerNotTrustedForScope(key_id) | Self::SignerRevoked(key_id) => {
                Some(serde_json::json!({ "key_id": key_id }))
            }
            Self::VerificationFailed { issues } => Some(serde_json::json!({ "issues": issues })),
            Self::DestinationExists(path) => {
                Some(serde_json::json!({ "destination": path.display().to_string() }))
            }
            Self::IoFailure { reason, rollback } => {
                Some(serde_json::json!({ "reason": reason, "rollback_error": rollback }))
            }
            Self::DuplicateTarget(kind) => Some(serde_json::json!({ "target": kind })),
            _ => None,
        }
    }

    /// True for failures that no verification policy can waive.
    #[must_use]
    pub const fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. }
                | Self::SizeMismatch { .. }
                | Self::SignerNotTrustedForScope(_)
                | Self::SignerRevoked(_)
                | Self::LimitExceeded { .. }
        )
    }

    /// Convert this error to a structured error.
    #[must_use]
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::from_gate_error(self)
    }
}

/// A structured error with machine-readable code, suggestion, and context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// The error code (e.g., "CHECKSUM_MISMATCH")
    pub code: ErrorCode,

    /// The numeric error code (e.g., 201)
    pub numeric_code: u16,

    /// Human-readable error message
    pub message: String,

    /// Actionable suggestion for recovery
    pub suggestion: String,

    /// Additional context for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// Whether this error is potentially recoverable by the user
    pub recoverable: bool,

    /// Error category (e.g., "archive", "verification", "install")
    pub category: String,
}

impl StructuredError {
    /// Create a structured error from a `GateError`.
    #[must_use]
    pub fn from_gate_error(err: &GateError) -> Self {
        let code = err.code();
        Self {
            code,
            numeric_code: code.numeric(),
            message: err.to_string(),
            suggestion: code.suggestion().to_string(),
            context: err.context(),
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
        }
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&GateError> for StructuredError {
    fn from(err: &GateError) -> Self {
        Self::from_gate_error(err)
    }
}

/// Result type alias using `GateError`.
pub type Result<T> = std::result::Result<T, GateError>;
