//! Intent recognition: normalize, then patterns, then keyword fallback.

use tracing::debug;

use crate::fallback::FallbackMatcher;
use crate::intent::Intent;
use crate::matcher::PatternMatcher;
use crate::normalizer::Normalizer;

#[derive(Default)]
pub struct IntentRecognizer {
    normalizer: Normalizer,
    matcher: PatternMatcher,
    fallback: FallbackMatcher,
}

impl IntentRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parts(normalizer: Normalizer, matcher: PatternMatcher) -> Self {
        Self {
            normalizer,
            matcher,
            fallback: FallbackMatcher::new(),
        }
    }

    pub fn normalize(&self, input: &str) -> String {
        self.normalizer.normalize(input)
    }

    /// Classify raw user text. Always returns an intent; unrecognised input
    /// comes back as `unknown` with zero confidence.
    pub fn recognize(&self, input: &str) -> Intent {
        let normalized = self.normalizer.normalize(input);

        if let Some(intent) = self.matcher.match_input(&normalized, input) {
            debug!(intent = %intent.kind, normalized = %normalized, "pattern match");
            return intent;
        }

        let intent = self.fallback.fuzzy_match(&normalized, input);
        debug!(
            intent = %intent.kind,
            confidence = intent.confidence,
            normalized = %normalized,
            "fallback match"
        );
        intent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentKind;

    #[test]
    fn test_typo_then_pattern() {
        let r = IntentRecognizer::new();
        let intent = r.recognize("isntall vim");
        assert_eq!(intent.kind, IntentKind::Install);
        assert_eq!(intent.package(), Some("vim"));
        assert_eq!(intent.original_input, "isntall vim");
    }

    #[test]
    fn test_split_package_name_is_joined() {
        let intent = IntentRecognizer::new().recognize("serach fire fox");
        assert_eq!(intent.kind, IntentKind::Search);
        assert_eq!(intent.package(), Some("firefox"));
    }

    #[test]
    fn test_recognize_is_stable_under_prior_normalization() {
        let r = IntentRecognizer::new();
        let raw = "  SEARCH   Firefox ";
        assert_eq!(r.recognize(raw).kind, r.recognize(&r.normalize(raw)).kind);
        assert_eq!(r.recognize(raw).package(), r.recognize(&r.normalize(raw)).package());
    }

    #[test]
    fn test_unknown_falls_through() {
        let intent = IntentRecognizer::new().recognize("do something with stuff");
        assert!(intent.is_unknown());
        assert_eq!(intent.confidence, 0.0);
    }
}
