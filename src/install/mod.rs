//! Skill installation: extraction, content checks, the staged atomic swap
//! into one target, and best-effort fan-out across targets.

pub mod archive;
pub mod content;
pub mod digest;
pub mod installer;
pub mod lock;
pub mod multi;

pub use content::{ContentValidator, NoopContentValidator, SkillMdValidator, ValidationFinding};
pub use installer::{ArchiveInstaller, InstallOptions, InstallResult};
pub use multi::{
    DefaultPostInstallValidator, MultiTargetInstaller, MultiTargetOutcome, PostInstallValidator,
};
