//! Artifact verification: manifest model, policy, and the verifier itself.

pub mod manifest;
pub mod policy;
pub mod verifier;

pub use manifest::{ArtifactManifest, BuiltWith};
pub use policy::{VerificationLimits, VerificationMode, VerificationPolicy};
pub use verifier::{ArtifactVerifier, VerificationOutcome, sha256_file};
