//! Shared test utilities for skillgate: real zip archives, Ed25519 signers,
//! isolated target roots, and scenario logging.

pub mod fixtures;
pub mod logging;

pub use fixtures::{SkillArchiveBuilder, SkillFixture, TestSigner, skill_md};
pub use logging::TestLogger;
