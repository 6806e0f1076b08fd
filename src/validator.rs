//! Safety validator for nixtalk
//!
//! Double check on every built command before it can run: the raw string
//! must not match any deny-list pattern, and it must start with one of the
//! template bases. Both checks have to pass. A command that clears them is
//! marked `safe`; nothing else is.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::builder::BuiltCommand;
use crate::error::{PipelineError, Result};

/// A pattern for detecting dangerous commands
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DangerPattern {
    pub name: String,
    pub pattern: String,
    pub category: DangerCategory,
}

/// Categories of dangerous command
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DangerCategory {
    PrivilegeEscalation, // sudo, doas, su
    RecursiveDelete,     // rm -rf
    DeviceWrite,         // > /dev/sda, dd, mkfs
    Redirection,         // 2>&1, > /dev/null
    PipeToShell,         // | sh
    RemoteFetch,         // curl ... |
    ResourceExhaustion,  // fork bombs
    ShellSyntax,         // ; & | ` $
}

struct CompiledPattern {
    info: DangerPattern,
    regex: Regex,
}

/// Deny-list + allow-list command validator
pub struct SafetyValidator {
    patterns: Vec<CompiledPattern>,
    allowed_bases: Vec<String>,
}

impl SafetyValidator {
    /// Create a validator with the default deny-list and the given allowed bases
    pub fn new(allowed_bases: Vec<String>) -> Self {
        Self::with_patterns(Self::default_patterns(), allowed_bases)
    }

    /// Create a validator with custom deny-list patterns
    pub fn with_patterns(patterns: Vec<DangerPattern>, allowed_bases: Vec<String>) -> Self {
        let compiled = patterns
            .into_iter()
            .filter_map(|p| {
                Regex::new(&p.pattern).ok().map(|r| CompiledPattern {
                    info: p,
                    regex: r,
                })
            })
            .collect();

        Self {
            patterns: compiled,
            allowed_bases: allowed_bases
                .iter()
                .map(|b| b.split_whitespace().collect::<Vec<_>>().join(" "))
                .collect(),
        }
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// First deny-list pattern the text matches
    pub fn find_danger(&self, text: &str) -> Option<&DangerPattern> {
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(text))
            .map(|p| &p.info)
    }

    pub fn is_dangerous(&self, text: &str) -> bool {
        self.find_danger(text).is_some()
    }

    /// Whether the raw command starts with an allowed base at a word boundary
    pub fn has_allowed_base(&self, raw: &str) -> bool {
        self.allowed_bases.iter().any(|base| {
            raw == base
                || raw
                    .strip_prefix(base.as_str())
                    .map(|rest| rest.starts_with(' '))
                    .unwrap_or(false)
        })
    }

    /// Reject the command if it is dangerous or not built from a template
    pub fn validate(&self, command: &BuiltCommand) -> Result<()> {
        if let Some(danger) = self.find_danger(&command.raw) {
            warn!(
                pattern = %danger.name,
                category = ?danger.category,
                intent = %command.intent,
                "rejected dangerous command"
            );
            return Err(PipelineError::UnsafeCommand {
                pattern: danger.name.clone(),
            });
        }

        if !self.has_allowed_base(&command.raw) {
            warn!(intent = %command.intent, "rejected command without an allowed base");
            return Err(PipelineError::UnsafeCommand {
                pattern: "not an allowed base".to_string(),
            });
        }

        // What runs is `parts`; make sure it is exactly what was checked
        if command.parts.join(" ") != command.raw {
            warn!(intent = %command.intent, "rejected command whose argv differs from its raw form");
            return Err(PipelineError::UnsafeCommand {
                pattern: "argv mismatch".to_string(),
            });
        }

        Ok(())
    }

    /// Validate and mark the command safe to execute
    pub fn approve(&self, mut command: BuiltCommand) -> Result<BuiltCommand> {
        command.safe = false;
        self.validate(&command)?;
        command.safe = true;
        Ok(command)
    }

    /// Default deny-list
    fn default_patterns() -> Vec<DangerPattern> {
        vec![
            // Privilege escalation
            DangerPattern {
                name: "sudo".into(),
                pattern: r"(?i)\b(?:sudo|doas|pkexec)\b".into(),
                category: DangerCategory::PrivilegeEscalation,
            },
            DangerPattern {
                name: "switch user".into(),
                pattern: r"(?:^|\s)su(?:\s|$)".into(),
                category: DangerCategory::PrivilegeEscalation,
            },

            // Destruction
            DangerPattern {
                name: "recursive delete".into(),
                pattern: r"(?i)\brm\s+-[a-z]*[rf]".into(),
                category: DangerCategory::RecursiveDelete,
            },
            DangerPattern {
                name: "write to device".into(),
                pattern: r">\s*/dev/".into(),
                category: DangerCategory::DeviceWrite,
            },
            DangerPattern {
                name: "disk dump".into(),
                pattern: r"\bdd\s+if=".into(),
                category: DangerCategory::DeviceWrite,
            },
            DangerPattern {
                name: "make filesystem".into(),
                pattern: r"\bmkfs\b".into(),
                category: DangerCategory::DeviceWrite,
            },
            DangerPattern {
                name: "world-writable chmod".into(),
                pattern: r"\bchmod\s+(?:-R\s+)?777\b".into(),
                category: DangerCategory::DeviceWrite,
            },

            // Redirection
            DangerPattern {
                name: "stderr redirect".into(),
                pattern: r"2>&1".into(),
                category: DangerCategory::Redirection,
            },

            // Remote code
            DangerPattern {
                name: "pipe to shell".into(),
                pattern: r"\|\s*(?:ba|z|da|k)?sh\b".into(),
                category: DangerCategory::PipeToShell,
            },
            DangerPattern {
                name: "fetch and pipe".into(),
                pattern: r"(?i)\b(?:curl|wget)\b.*\|".into(),
                category: DangerCategory::RemoteFetch,
            },

            DangerPattern {
                name: "fork bomb".into(),
                pattern: r":\(\)\s*\{".into(),
                category: DangerCategory::ResourceExhaustion,
            },

            // Anything a shell would interpret
            DangerPattern {
                name: "shell metacharacter".into(),
                pattern: r"[;&|`$<>\n]".into(),
                category: DangerCategory::ShellSyntax,
            },
        ]
    }
}
