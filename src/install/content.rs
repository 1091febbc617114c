//! Package content validation.
//!
//! A skill package must carry a `SKILL.md` whose YAML frontmatter names and
//! describes it. [`SkillMdValidator`] applies the per-runtime rules; callers
//! can plug in their own [`ContentValidator`].

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_yaml::Value;

use crate::target::TargetKind;

/// Required entry file at the root of every skill package.
pub const SKILL_FILE: &str = "SKILL.md";

static CLAUDE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9-]{1,64}$").unwrap_or_else(|err| panic!("invalid name pattern: {err}"))
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFinding {
    pub severity: Severity,
    pub message: String,
}

impl ValidationFinding {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Inspects a package's entry file before it is installed.
///
/// Any [`Severity::Error`] finding rejects the package.
pub trait ContentValidator: Send + Sync {
    fn validate(&self, skill_md: &str, dir_name: &str, target: TargetKind) -> Vec<ValidationFinding>;
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopContentValidator;

impl ContentValidator for NoopContentValidator {
    fn validate(&self, _skill_md: &str, _dir_name: &str, _target: TargetKind) -> Vec<ValidationFinding> {
        Vec::new()
    }
}

/// Frontmatter rules for `SKILL.md`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkillMdValidator;

struct Limits {
    name: usize,
    description: usize,
}

const fn limits_for(target: TargetKind) -> Limits {
    match target {
        TargetKind::Claude => Limits {
            name: 64,
            description: 1024,
        },
        TargetKind::Codex | TargetKind::Copilot | TargetKind::Custom => Limits {
            name: 100,
            description: 500,
        },
    }
}

/// Split `---` delimited YAML frontmatter off the top of a document.
fn frontmatter(text: &str) -> Option<&str> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != "---" {
        return None;
    }
    let start = first.len();
    let mut offset = start;
    for line in lines {
        if line.trim_end() == "---" {
            return Some(&text[start..offset]);
        }
        offset += line.len();
    }
    None
}

fn string_field(doc: &Value, field: &str) -> Option<String> {
    doc.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl ContentValidator for SkillMdValidator {
    fn validate(&self, skill_md: &str, dir_name: &str, target: TargetKind) -> Vec<ValidationFinding> {
        let Some(raw) = frontmatter(skill_md) else {
            return vec![ValidationFinding::error("Missing YAML frontmatter")];
        };
        let doc: Value = match serde_yaml::from_str(raw) {
            Ok(doc) => doc,
            Err(err) => {
                return vec![ValidationFinding::error(format!(
                    "Frontmatter is not valid YAML: {err}"
                ))];
            }
        };

        let mut findings = Vec::new();
        let name = string_field(&doc, "name");
        let description = string_field(&doc, "description");
        if name.is_none() {
            findings.push(ValidationFinding::error("Frontmatter missing name"));
        }
        if description.is_none() {
            findings.push(ValidationFinding::error("Frontmatter missing description"));
        }

        let limits = limits_for(target);
        if let Some(name) = &name {
            if target == TargetKind::Claude {
                if !CLAUDE_NAME.is_match(name) {
                    findings.push(ValidationFinding::error(format!(
                        "Name {name:?} must be 1-64 lowercase letters, digits, or hyphens"
                    )));
                }
                if name != dir_name {
                    findings.push(ValidationFinding::warning(format!(
                        "Name {name:?} does not match directory {dir_name:?}"
                    )));
                }
            } else if name.chars().count() > limits.name {
                findings.push(ValidationFinding::error(format!(
                    "Name exceeds {} characters",
                    limits.name
                )));
            }
        }
        if let Some(description) = &description {
            if description.chars().count() > limits.description {
                findings.push(ValidationFinding::error(format!(
                    "Description exceeds {} characters",
                    limits.description
                )));
            }
        }
        findings
    }
}
