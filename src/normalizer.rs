//! Input normalizer for nixtalk
//!
//! Lowercases, trims and collapses whitespace, then fixes known typos and
//! synonyms by literal substring replacement. Total and deterministic: every
//! string normalizes to something, and normalizing twice changes nothing.

/// A literal typo/synonym rewrite
#[derive(Clone, Debug)]
struct TypoPattern {
    /// The misspelled text
    typo: String,
    /// What it becomes
    correction: String,
}

/// Input normalizer
#[derive(Clone, Debug)]
pub struct Normalizer {
    /// Applied in order
    typo_patterns: Vec<TypoPattern>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Create a normalizer with the built-in correction table
    pub fn new() -> Self {
        let mut normalizer = Self {
            typo_patterns: Vec::new(),
        };
        normalizer.add_common_typos();
        normalizer
    }

    /// Add a correction. Later corrections see the output of earlier ones.
    pub fn add_correction(&mut self, typo: &str, correction: &str) {
        self.typo_patterns.push(TypoPattern {
            typo: typo.to_lowercase(),
            correction: correction.to_lowercase(),
        });
    }

    pub fn normalize(&self, input: &str) -> String {
        let mut normalized = collapse_whitespace(&input.to_lowercase());

        for pattern in &self.typo_patterns {
            if normalized.contains(&pattern.typo) {
                normalized = normalized.replace(&pattern.typo, &pattern.correction);
            }
        }

        normalized
    }

    fn add_common_typos(&mut self) {
        let typos = [
            // Verbs
            ("isntall", "install"),
            ("intall", "install"),
            ("serach", "search"),
            ("serch", "search"),
            ("fnd", "find"),
            ("lst", "list"),
            ("updte", "update"),
            ("upgarde", "upgrade"),
            ("remvoe", "remove"),
            ("pacakge", "package"),
            ("pakage", "package"),
            // Package names people split or suffix
            ("python3", "python"),
            ("fire fox", "firefox"),
            ("vs code", "vscode"),
        ];

        for (typo, correction) in typos {
            self.add_correction(typo, correction);
        }
    }
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Calculate Levenshtein edit distance between two strings
pub(crate) fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();
    let len1 = s1_chars.len();
    let len2 = s2_chars.len();

    if len1 == 0 {
        return len2;
    }
    if len2 == 0 {
        return len1;
    }

    let mut matrix = vec![vec![0usize; len2 + 1]; len1 + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=len2 {
        matrix[0][j] = j;
    }

    for i in 1..=len1 {
        for j in 1..=len2 {
            let cost = if s1_chars[i - 1] == s2_chars[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[len1][len2]
}
