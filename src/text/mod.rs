//! Text tokenization for lexical indexing.
//!
//! A pure, stateless tokenizer shared by index build and query paths.
//! Using the same configuration on both sides is load-bearing: a
//! mismatch silently breaks scoring, so [`Bm25Index`](crate::search::bm25::Bm25Index)
//! owns one tokenizer and runs every string through it.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Common English stopwords (minimal set)
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "will", "with",
];

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\w+").expect("static word pattern"))
}

/// Tokenizer configuration shared between indexing and querying.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    /// Lowercase tokens before emitting them
    pub lowercase: bool,
    /// Filter out stopwords
    pub remove_stopwords: bool,
    stopwords: HashSet<String>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Tokenizer {
    /// Create a tokenizer with the default stopword list.
    pub fn new(lowercase: bool, remove_stopwords: bool) -> Self {
        Self {
            lowercase,
            remove_stopwords,
            stopwords: DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the stopword list.
    pub fn with_stopwords(mut self, stopwords: impl IntoIterator<Item = String>) -> Self {
        self.stopwords = stopwords.into_iter().collect();
        self
    }

    /// Split text into index terms.
    ///
    /// Normalizes to unicode NFC, optionally lowercases, then extracts
    /// alphanumeric runs (including digits). Punctuation never produces
    /// a token.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized: String = text.nfc().collect();
        let normalized = if self.lowercase {
            normalized.to_lowercase()
        } else {
            normalized
        };

        word_pattern()
            .find_iter(&normalized)
            .map(|m| m.as_str().to_string())
            .filter(|t| !self.remove_stopwords || !self.stopwords.contains(t))
            .collect()
    }
}
