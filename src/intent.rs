//! Intent data model
//!
//! An [`Intent`] is what the recognizer produces for one utterance: the
//! action the user asked for, how sure we are, and any parameters pulled
//! out of the text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of actions nixtalk understands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentKind {
    Search,
    List,
    SystemInfo,
    Check,
    PackageInfo,
    Install,
    Remove,
    Update,
    ListUpdates,
    GarbageCollect,
    ServiceStatus,
    Unknown,
}

impl IntentKind {
    /// Every actionable kind, in rule declaration order
    pub const ACTIONABLE: [IntentKind; 11] = [
        IntentKind::Search,
        IntentKind::List,
        IntentKind::SystemInfo,
        IntentKind::Check,
        IntentKind::PackageInfo,
        IntentKind::Install,
        IntentKind::Remove,
        IntentKind::Update,
        IntentKind::ListUpdates,
        IntentKind::GarbageCollect,
        IntentKind::ServiceStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Search => "search",
            IntentKind::List => "list",
            IntentKind::SystemInfo => "system-info",
            IntentKind::Check => "check",
            IntentKind::PackageInfo => "package-info",
            IntentKind::Install => "install",
            IntentKind::Remove => "remove",
            IntentKind::Update => "update",
            IntentKind::ListUpdates => "list-updates",
            IntentKind::GarbageCollect => "garbage-collect",
            IntentKind::ServiceStatus => "service-status",
            IntentKind::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<IntentKind> {
        IntentKind::ACTIONABLE
            .iter()
            .copied()
            .chain(std::iter::once(IntentKind::Unknown))
            .find(|k| k.as_str() == s)
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Package,
    Service,
    Setting,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Package => "package",
            EntityKind::Service => "service",
            EntityKind::Setting => "setting",
        }
    }
}

/// A named parameter extracted from the utterance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub value: String,
    pub confidence: f64,
}

impl Entity {
    pub fn new(kind: EntityKind, value: impl Into<String>, confidence: f64) -> Self {
        Self {
            kind,
            value: value.into(),
            confidence,
        }
    }
}

/// A classified user goal. Immutable once produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    #[serde(rename = "type")]
    pub kind: IntentKind,
    pub confidence: f64,
    pub entities: Vec<Entity>,
    pub original_input: String,
}

impl Intent {
    pub fn new(kind: IntentKind, confidence: f64, entities: Vec<Entity>, original_input: &str) -> Self {
        Self {
            kind,
            confidence: confidence.clamp(0.0, 1.0),
            entities,
            original_input: original_input.to_string(),
        }
    }

    /// The terminal "I have no idea" intent
    pub fn unknown(original_input: &str) -> Self {
        Self::new(IntentKind::Unknown, 0.0, Vec::new(), original_input)
    }

    pub fn is_unknown(&self) -> bool {
        self.kind == IntentKind::Unknown
    }

    /// First entity of the given kind
    pub fn entity(&self, kind: EntityKind) -> Option<&Entity> {
        self.entities.iter().find(|e| e.kind == kind)
    }

    pub fn package(&self) -> Option<&str> {
        self.entity(EntityKind::Package).map(|e| e.value.as_str())
    }

    /// The first entity, whatever its kind. Used for template arguments.
    pub fn primary_argument(&self) -> Option<&Entity> {
        self.entities.first()
    }
}
