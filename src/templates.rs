//! Command templates
//!
//! One pre-approved command skeleton per actionable intent. The table is
//! built once at start-up (built-in defaults, optionally replaced from a YAML
//! file) and is read-only afterwards, so it can be shared freely.
//!
//! YAML format:
//!
//! ```yaml
//! - intent: search
//!   base: nix search nixpkgs
//!   requires_argument: true
//!   allowed_options: ["--json"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::intent::{EntityKind, IntentKind};

/// Characters a template base may never contain
const FORBIDDEN_BASE_CHARS: &[char] = &[';', '&', '|', '<', '>', '`', '$', '(', ')', '{', '}', '\n'];

/// A pre-approved command skeleton
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandTemplate {
    /// Intent this template serves
    pub intent: IntentKind,
    /// Fixed command prefix, e.g. `nix search nixpkgs`
    pub base: String,
    /// Whether a sanitized argument is appended after the base
    #[serde(default)]
    pub requires_argument: bool,
    /// What the argument names (used when prompting for it)
    #[serde(default = "default_argument_kind")]
    pub argument_kind: EntityKind,
    /// Fixed options appended after the argument
    #[serde(default)]
    pub allowed_options: Vec<String>,
    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
}

fn default_argument_kind() -> EntityKind {
    EntityKind::Package
}

impl CommandTemplate {
    fn new(
        intent: IntentKind,
        base: &str,
        requires_argument: bool,
        options: &[&str],
        description: &str,
    ) -> Self {
        Self {
            intent,
            base: base.to_string(),
            requires_argument,
            argument_kind: EntityKind::Package,
            allowed_options: options.iter().map(|o| o.to_string()).collect(),
            description: Some(description.to_string()),
        }
    }

    fn with_argument_kind(mut self, kind: EntityKind) -> Self {
        self.argument_kind = kind;
        self
    }

    /// Whether the template always runs in dry-run mode
    pub fn is_dry_run(&self) -> bool {
        self.base.contains("--dry-run") || self.allowed_options.iter().any(|o| o == "--dry-run")
    }

    fn check(&self) -> Result<()> {
        if self.base.trim().is_empty() {
            return Err(PipelineError::Config(format!(
                "template for '{}' has an empty base",
                self.intent
            )));
        }
        let bad = self
            .base
            .chars()
            .chain(self.allowed_options.iter().flat_map(|o| o.chars()))
            .any(|c| FORBIDDEN_BASE_CHARS.contains(&c));
        if bad {
            return Err(PipelineError::Config(format!(
                "template for '{}' contains shell metacharacters",
                self.intent
            )));
        }
        if self.intent == IntentKind::Unknown {
            return Err(PipelineError::Config("the unknown intent cannot have a template".into()));
        }
        Ok(())
    }
}

/// Read-only lookup from intent to template
#[derive(Clone, Debug)]
pub struct TemplateTable {
    templates: HashMap<IntentKind, CommandTemplate>,
}

impl Default for TemplateTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateTable {
    /// The built-in user-space command set
    pub fn builtin() -> Self {
        let templates = vec![
            CommandTemplate::new(
                IntentKind::Search,
                "nix search nixpkgs",
                true,
                &["--json"],
                "Find available packages",
            ),
            CommandTemplate::new(
                IntentKind::List,
                "nix-env -q",
                false,
                &["--installed", "--json"],
                "Show installed packages",
            ),
            CommandTemplate::new(
                IntentKind::SystemInfo,
                "nix-info -m",
                false,
                &[],
                "Display system information",
            ),
            CommandTemplate::new(IntentKind::Check, "nix doctor", false, &[], "Run health diagnostics"),
            CommandTemplate::new(
                IntentKind::PackageInfo,
                "nix path-info",
                true,
                &["--json"],
                "Show details about a package",
            ),
            CommandTemplate::new(
                IntentKind::Install,
                "nix-env -iA nixpkgs",
                true,
                &["--dry-run"],
                "Install a package (dry-run)",
            ),
            CommandTemplate::new(
                IntentKind::Remove,
                "nix-env -e",
                true,
                &["--dry-run"],
                "Remove a package (dry-run)",
            ),
            CommandTemplate::new(
                IntentKind::Update,
                "nix-channel --update",
                false,
                &[],
                "Update channels",
            ),
            CommandTemplate::new(
                IntentKind::ListUpdates,
                "nix-env -u --dry-run",
                false,
                &[],
                "Show available updates",
            ),
            CommandTemplate::new(
                IntentKind::GarbageCollect,
                "nix-collect-garbage --dry-run",
                false,
                &[],
                "Estimate reclaimable space",
            ),
            CommandTemplate::new(
                IntentKind::ServiceStatus,
                "systemctl status",
                true,
                &["--no-pager"],
                "Show a service's status",
            )
            .with_argument_kind(EntityKind::Service),
        ];

        Self::from_templates(templates)
    }

    fn from_templates(templates: Vec<CommandTemplate>) -> Self {
        Self {
            templates: templates
                .into_iter()
                .map(|mut t| {
                    // Commands are rebuilt from whitespace-split parts
                    t.base = t.base.split_whitespace().collect::<Vec<_>>().join(" ");
                    (t.intent, t)
                })
                .collect(),
        }
    }

    /// Build a table from explicit templates, checking each one
    pub fn with_templates(templates: Vec<CommandTemplate>) -> Result<Self> {
        for template in &templates {
            template.check()?;
        }
        Ok(Self::from_templates(templates))
    }

    /// Load a table from a YAML file, replacing the built-in set entirely
    pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let templates: Vec<CommandTemplate> = serde_yaml::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("{:?}: {}", path.as_ref(), e)))?;
        Self::with_templates(templates)
    }

    pub fn get(&self, intent: IntentKind) -> Option<&CommandTemplate> {
        self.templates.get(&intent)
    }

    /// All template bases: the executor allow-list
    pub fn bases(&self) -> Vec<String> {
        self.templates.values().map(|t| t.base.clone()).collect()
    }

    /// Templates in intent declaration order
    pub fn list(&self) -> Vec<&CommandTemplate> {
        IntentKind::ACTIONABLE
            .iter()
            .filter_map(|k| self.templates.get(k))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
