//! Pattern matcher
//!
//! An ordered list of rule groups, each a handful of regexes plus an entity
//! extractor. Groups are tried top to bottom and the first regex that matches
//! wins; later groups are never consulted. Rule order is therefore part of
//! the behaviour: "what is installed" is a listing because the list group
//! comes before the package-info group, not because it scores higher.

use regex::{Captures, Regex};

use crate::intent::{Entity, EntityKind, Intent, IntentKind};

/// Confidence assigned to every pattern match
pub const PATTERN_CONFIDENCE: f64 = 0.95;

/// How a matching regex turns into entities
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Extractor {
    /// No parameters
    Nothing,
    /// Capture group 1 is a package name
    Package,
    /// Capture group 1, if it participated, is a package name
    OptionalPackage,
    /// Capture group 1 is a service name
    Service,
}

impl Extractor {
    /// Extraction function for the given intent
    pub fn for_kind(kind: IntentKind) -> Extractor {
        match kind {
            IntentKind::Search
            | IntentKind::PackageInfo
            | IntentKind::Install
            | IntentKind::Remove => Extractor::Package,
            IntentKind::Update => Extractor::OptionalPackage,
            IntentKind::ServiceStatus => Extractor::Service,
            _ => Extractor::Nothing,
        }
    }

    pub fn extract(&self, caps: &Captures) -> Vec<Entity> {
        let captured = caps
            .get(1)
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty());

        match (self, captured) {
            (Extractor::Nothing, _) => vec![],
            (Extractor::Package | Extractor::OptionalPackage, Some(value)) => {
                vec![Entity::new(EntityKind::Package, value, PATTERN_CONFIDENCE)]
            }
            (Extractor::Service, Some(value)) => {
                vec![Entity::new(EntityKind::Service, value, PATTERN_CONFIDENCE)]
            }
            (_, None) => vec![],
        }
    }
}

/// One intent's worth of regexes
pub struct RuleGroup {
    pub kind: IntentKind,
    patterns: Vec<Regex>,
    extractor: Extractor,
}

impl RuleGroup {
    /// Compile a group. Patterns that fail to compile are dropped.
    pub fn new(kind: IntentKind, patterns: &[&str]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();

        Self {
            kind,
            patterns,
            extractor: Extractor::for_kind(kind),
        }
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    fn try_match(&self, normalized: &str) -> Option<Vec<Entity>> {
        self.patterns
            .iter()
            .find_map(|re| re.captures(normalized))
            .map(|caps| self.extractor.extract(&caps))
    }
}

/// Ordered, first-match-wins pattern matcher
pub struct PatternMatcher {
    groups: Vec<RuleGroup>,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternMatcher {
    /// Create a matcher with the built-in rule table
    pub fn new() -> Self {
        Self {
            groups: default_rule_groups(),
        }
    }

    pub fn with_groups(groups: Vec<RuleGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[RuleGroup] {
        &self.groups
    }

    /// Match already-normalized text. `None` hands off to the fallback.
    pub fn match_input(&self, normalized: &str, original_input: &str) -> Option<Intent> {
        self.groups.iter().find_map(|group| {
            group.try_match(normalized).map(|entities| {
                Intent::new(group.kind, PATTERN_CONFIDENCE, entities, original_input)
            })
        })
    }
}

fn default_rule_groups() -> Vec<RuleGroup> {
    vec![
        RuleGroup::new(
            IntentKind::Search,
            &[
                r"^search\s+(?:for\s+)?(.+)$",
                r"^find\s+(?:me\s+)?(.+)$",
                r"^look\s+for\s+(.+)$",
                r"^what\s+packages?\s+(?:are\s+)?(?:available\s+)?(?:for\s+)?(.+)$",
                r"^show\s+me\s+(.+)\s+packages?$",
            ],
        ),
        RuleGroup::new(
            IntentKind::List,
            &[
                r"^(?:list|show)\s+installed(?:\s+packages)?$",
                r"^what(?:'s|\s+is)\s+installed\??$",
                r"^show\s+me\s+what(?:'s|\s+is)\s+installed$",
                r"^my\s+packages$",
            ],
        ),
        RuleGroup::new(
            IntentKind::SystemInfo,
            &[
                r"^system\s+info(?:rmation)?$",
                r"^nix\s+info$",
                r"^show\s+(?:me\s+)?system\s+(?:details|info)$",
                r"^what(?:'s|\s+is)\s+my\s+nix\s+version\??$",
            ],
        ),
        RuleGroup::new(
            IntentKind::Check,
            &[
                r"^check\s+system(?:\s+health)?$",
                r"^nix\s+doctor$",
                r"^is\s+(?:my\s+)?(?:system|nix)\s+(?:ok|healthy|working)\??$",
                r"^diagnose\s+(?:my\s+)?system$",
            ],
        ),
        RuleGroup::new(
            IntentKind::PackageInfo,
            &[
                r"^(?:info|information)\s+(?:about\s+)?(.+?)\??$",
                r"^tell\s+me\s+about\s+(.+?)\??$",
                r"^what(?:'s|\s+is)\s+(.+?)\??$",
                r"^describe\s+(.+?)\??$",
            ],
        ),
        RuleGroup::new(
            IntentKind::Install,
            &[
                r"^install\s+(.+)$",
                r"^i\s+(?:want|need)\s+(.+)$",
                r"^get\s+(?:me\s+)?(.+)$",
                r"^add\s+(.+)$",
                r"^download\s+(.+)$",
            ],
        ),
        RuleGroup::new(
            IntentKind::Remove,
            &[
                r"^(?:remove|uninstall|delete)\s+(.+)$",
                r"^get\s+rid\s+of\s+(.+)$",
                r"^i\s+don'?t\s+(?:want|need)\s+(.+?)(?:\s+anymore)?$",
            ],
        ),
        RuleGroup::new(
            IntentKind::Update,
            &[
                r"^update\s*(?:everything|all|system)?$",
                r"^upgrade\s*(?:everything|all|system)?$",
                r"^check\s+for\s+updates?$",
                r"^update\s+(.+)$",
            ],
        ),
        RuleGroup::new(
            IntentKind::ListUpdates,
            &[
                r"^what(?:'s|\s+is)\s+(?:available\s+to\s+)?updat(?:e|able)\??$",
                r"^show\s+(?:me\s+)?updates?$",
                r"^list\s+updates?$",
            ],
        ),
        RuleGroup::new(
            IntentKind::GarbageCollect,
            &[
                r"^clean(?:\s+up)?\s*(?:my\s+)?(?:system|space|disk)?$",
                r"^free\s+(?:up\s+)?space$",
                r"^garbage\s+collect$",
                r"^remove\s+(?:old|unused)\s+(?:packages|stuff)$",
            ],
        ),
        RuleGroup::new(
            IntentKind::ServiceStatus,
            &[
                r"^is\s+(?:the\s+)?([a-z0-9@._-]+)\s+(?:service\s+)?running\??$",
                r"^(?:service\s+)?status\s+(?:of\s+)?(?:the\s+)?(.+?)(?:\s+service)?$",
                r"^check\s+(?:on\s+)?(?:the\s+)?(.+?)\s+service$",
            ],
        ),
    ]
}
