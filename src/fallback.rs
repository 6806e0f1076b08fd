//! Keyword fallback for input no pattern recognised.
//!
//! Looks for action keywords in the token set, tolerating a single typo in
//! longer keywords, and guesses an action at reduced confidence. Anything
//! else becomes the terminal `unknown` intent.

use crate::intent::{Entity, EntityKind, Intent, IntentKind};
use crate::normalizer::levenshtein_distance;

/// Confidence assigned to keyword guesses
pub const FALLBACK_CONFIDENCE: f64 = 0.7;

/// Keywords shorter than this must match exactly
const MIN_FUZZY_KEYWORD_LEN: usize = 5;

/// Words that never become part of a guessed package name
const FILLER_WORDS: &[&str] = &[
    "for", "me", "a", "an", "the", "please", "package", "packages", "called", "named", "some",
];

struct KeywordRule {
    keywords: &'static [&'static str],
    kind: IntentKind,
    takes_argument: bool,
}

const KEYWORD_RULES: &[KeywordRule] = &[
    KeywordRule {
        keywords: &["search", "find"],
        kind: IntentKind::Search,
        takes_argument: true,
    },
    KeywordRule {
        keywords: &["list", "installed"],
        kind: IntentKind::List,
        takes_argument: false,
    },
    KeywordRule {
        keywords: &["install"],
        kind: IntentKind::Install,
        takes_argument: true,
    },
    KeywordRule {
        keywords: &["remove", "uninstall"],
        kind: IntentKind::Remove,
        takes_argument: true,
    },
    KeywordRule {
        keywords: &["update", "upgrade"],
        kind: IntentKind::Update,
        takes_argument: false,
    },
];

#[derive(Default)]
pub struct FallbackMatcher;

impl FallbackMatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn fuzzy_match(&self, normalized: &str, original_input: &str) -> Intent {
        let words: Vec<&str> = normalized.split_whitespace().collect();

        for rule in KEYWORD_RULES {
            let Some(hit) = words.iter().position(|w| keyword_hit(w, rule.keywords)) else {
                continue;
            };

            let mut entities = Vec::new();
            if rule.takes_argument {
                // Only words after the keyword can name the package
                let rest: Vec<&str> = words[hit + 1..]
                    .iter()
                    .filter(|w| !FILLER_WORDS.contains(*w) && !keyword_hit(w, rule.keywords))
                    .copied()
                    .collect();
                if !rest.is_empty() {
                    entities.push(Entity::new(
                        EntityKind::Package,
                        rest.join(" "),
                        FALLBACK_CONFIDENCE,
                    ));
                }
            }

            return Intent::new(rule.kind, FALLBACK_CONFIDENCE, entities, original_input);
        }

        Intent::unknown(original_input)
    }
}

fn keyword_hit(word: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| {
        *k == word
            || (k.len() >= MIN_FUZZY_KEYWORD_LEN
                && word.len() + 1 >= k.len()
                && levenshtein_distance(word, k) <= 1)
    })
}
