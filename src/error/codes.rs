//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 1xx: Archive errors
//! - 2xx: Verification errors
//! - 3xx: Config errors
//! - 4xx: Install errors
//! - 5xx: Trust store errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for callers that need to branch on failures.
///
/// Each variant maps to a numeric code (e.g., `ChecksumMismatch` -> E201).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Archive errors (1xx)
    // ========================================
    /// E101: Archive is missing or cannot be read
    ArchiveUnreadable,
    /// E102: Archive could not be extracted
    ExtractionFailed,
    /// E103: No directory with the skill entry file was found
    SkillRootMissing,
    /// E104: More than one candidate skill directory was found
    SkillRootAmbiguous,
    /// E105: Archive or extracted content exceeds policy limits
    LimitExceeded,

    // ========================================
    // Verification errors (2xx)
    // ========================================
    /// E201: Archive digest does not match the manifest
    ChecksumMismatch,
    /// E202: Archive size does not match the manifest
    SizeMismatch,
    /// E203: Signer is not in the manifest's trusted signer list
    SignerNotTrusted,
    /// E204: Signer key has been revoked
    SignerRevoked,
    /// E205: Strict verification found soft issues
    VerificationFailed,
    /// E206: Package content failed validation
    ContentInvalid,
    /// E207: Public key material is malformed
    InvalidKey,

    // ========================================
    // Config errors (3xx)
    // ========================================
    /// E301: Config file or environment value is invalid
    ConfigInvalid,

    // ========================================
    // Install errors (4xx)
    // ========================================
    /// E401: Destination already exists and overwrite was not requested
    DestinationExists,
    /// E402: Atomic replace failed; previous content was restored
    ReplaceFailed,
    /// E403: Atomic replace failed and restoring the backup failed too
    RollbackFailed,
    /// E404: The same target kind was requested twice
    DuplicateTarget,
    /// E405: Could not acquire the destination lock
    LockFailed,

    // ========================================
    // Trust store errors (5xx)
    // ========================================
    /// E501: Persisted trust data could not be decoded
    DecodeFailed,
    /// E502: Keyset was expired or its signature did not verify
    KeysetRejected,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E901: IO operation failed
    IoError,
    /// E902: Failed to serialize/deserialize data
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric error code (e.g., `ChecksumMismatch` -> 201).
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::ArchiveUnreadable => 101,
            Self::ExtractionFailed => 102,
            Self::SkillRootMissing => 103,
            Self::SkillRootAmbiguous => 104,
            Self::LimitExceeded => 105,

            Self::ChecksumMismatch => 201,
            Self::SizeMismatch => 202,
            Self::SignerNotTrusted => 203,
            Self::SignerRevoked => 204,
            Self::VerificationFailed => 205,
            Self::ContentInvalid => 206,
            Self::InvalidKey => 207,

            Self::ConfigInvalid => 301,

            Self::DestinationExists => 401,
            Self::ReplaceFailed => 402,
            Self::RollbackFailed => 403,
            Self::DuplicateTarget => 404,
            Self::LockFailed => 405,

            Self::DecodeFailed => 501,
            Self::KeysetRejected => 502,

            Self::IoError => 901,
            Self::SerializationError => 902,
        }
    }

    /// Get the error code as a formatted string (e.g., "E201").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    /// Get the default suggestion for this error code.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::ArchiveUnreadable => "Re-download the archive and check the file path",
            Self::ExtractionFailed => "The archive is corrupt or contains unsafe paths. Re-download it or contact the publisher",
            Self::SkillRootMissing => "The archive must contain one top-level directory with a SKILL.md file",
            Self::SkillRootAmbiguous => "The archive contains several skill directories; publish one skill per archive",
            Self::LimitExceeded => "The package exceeds configured size, file-count, or symlink limits",
            Self::ChecksumMismatch => "The archive does not match its manifest. Do not install it; re-download from a trusted source",
            Self::SizeMismatch => "The archive size differs from the manifest. Re-download the archive",
            Self::SignerNotTrusted => "The manifest's signer is not in its own trusted signer list",
            Self::SignerRevoked => "The signing key has been revoked. Do not install this package",
            Self::VerificationFailed => "Trust the signer, or retry with the permissive verification mode",
            Self::ContentInvalid => "Fix the package's SKILL.md frontmatter and republish",
            Self::InvalidKey => "Check that the public key is a base64-encoded 32-byte Ed25519 key",
            Self::ConfigInvalid => "Check the config file and SKILLGATE_* environment variables",
            Self::DestinationExists => "Pass overwrite to replace the installed skill",
            Self::ReplaceFailed => "The previous install was restored. Check permissions on the target directory",
            Self::RollbackFailed => "The destination may be corrupted. Inspect it and reinstall the skill",
            Self::DuplicateTarget => "List each target kind at most once",
            Self::LockFailed => "Another install to the same destination may be running. Retry shortly",
            Self::DecodeFailed => "The trust store file is corrupt or from an unsupported version",
            Self::KeysetRejected => "Fetch a fresh keyset; expired or unsigned keysets are never applied",
            Self::IoError => "File operation failed. Check path exists and permissions are correct",
            Self::SerializationError => "Data format error. The file may be corrupted",
        }
    }

    /// Check if this error is potentially recoverable by the user.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::ArchiveUnreadable
            | Self::SizeMismatch
            | Self::VerificationFailed
            | Self::ContentInvalid
            | Self::InvalidKey
            | Self::ConfigInvalid
            | Self::DestinationExists
            | Self::ReplaceFailed
            | Self::DuplicateTarget
            | Self::LockFailed
            | Self::KeysetRejected
            | Self::IoError => true,

            // Tampered or hostile input, or a corrupted destination
            Self::ExtractionFailed
            | Self::SkillRootMissing
            | Self::SkillRootAmbiguous
            | Self::LimitExceeded
            | Self::ChecksumMismatch
            | Self::SignerNotTrusted
            | Self::SignerRevoked
            | Self::RollbackFailed
            | Self::DecodeFailed
            | Self::SerializationError => false,
        }
    }

    /// Get the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self.numeric() / 100 {
            1 => "archive",
            2 => "verification",
            3 => "config",
            4 => "install",
            5 => "trust",
            9 => "internal",
            _ => "unknown",
        }
    }

    /// Iterate over all error codes.
    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::ArchiveUnreadable,
            Self::ExtractionFailed,
            Self::SkillRootMissing,
            Self::SkillRootAmbiguous,
            Self::LimitExceeded,
            Self::ChecksumMismatch,
            Self::SizeMismatch,
            Self::SignerNotTrusted,
            Self::SignerRevoked,
            Self::VerificationFailed,
            Self::ContentInvalid,
            Self::InvalidKey,
            Self::ConfigInvalid,
            Self::DestinationExists,
            Self::ReplaceFailed,
            Self::RollbackFailed,
            Self::DuplicateTarget,
            Self::LockFailed,
            Self::DecodeFailed,
            Self::KeysetRejected,
            Self::IoError,
            Self::SerializationError,
        ]
        .into_iter()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_string())
    }
}
