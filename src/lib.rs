//! Secure installation of third-party agent skill packages.
//!
//! An archive is verified against its manifest and the local trust store,
//! extracted under resource limits, checked for a valid `SKILL.md`, and
//! swapped atomically into one or more target roots.

pub mod codec;
pub mod config;
pub mod error;
pub mod install;
pub mod logging;
pub mod target;
pub mod test_utils;
pub mod trust;
pub mod utils;
pub mod verify;

pub use error::{GateError, Result};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
