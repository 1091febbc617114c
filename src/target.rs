//! Install targets: the agent runtimes a skill can be placed into.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// Kind of agent runtime a skill is installed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetKind {
    Codex,
    Claude,
    Copilot,
    Custom,
}

impl TargetKind {
    pub const ALL: [Self; 4] = [Self::Codex, Self::Claude, Self::Copilot, Self::Custom];

    #[must_use]
    pub const fn display_label(&self) -> &'static str {
        match self {
            Self::Codex => "Codex",
            Self::Claude => "Claude",
            Self::Copilot => "Copilot",
            Self::Custom => "Custom",
        }
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Codex => write!(f, "codex"),
            Self::Claude => write!(f, "claude"),
            Self::Copilot => write!(f, "copilot"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for TargetKind {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "codex" => Ok(Self::Codex),
            "claude" => Ok(Self::Claude),
            "copilot" => Ok(Self::Copilot),
            "custom" => Ok(Self::Custom),
            _ => Err(GateError::Config(format!(
                "invalid target kind: {s} (expected codex, claude, copilot, or custom)"
            ))),
        }
    }
}

/// A root directory skills are installed into, tagged with its runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallTarget {
    Codex(PathBuf),
    Claude(PathBuf),
    Copilot(PathBuf),
    Custom(PathBuf),
}

impl InstallTarget {
    #[must_use]
    pub fn new(kind: TargetKind, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        match kind {
            TargetKind::Codex => Self::Codex(root),
            TargetKind::Claude => Self::Claude(root),
            TargetKind::Copilot => Self::Copilot(root),
            TargetKind::Custom => Self::Custom(root),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> TargetKind {
        match self {
            Self::Codex(_) => TargetKind::Codex,
            Self::Claude(_) => TargetKind::Claude,
            Self::Copilot(_) => TargetKind::Copilot,
            Self::Custom(_) => TargetKind::Custom,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        match self {
            Self::Codex(root) | Self::Claude(root) | Self::Copilot(root) | Self::Custom(root) => {
                root
            }
        }
    }
}
