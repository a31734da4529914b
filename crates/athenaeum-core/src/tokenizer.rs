//! Tokenizer
//!
//! Lowercase, split on non-alphanumeric, drop stopwords and short tokens.
//! Pure and deterministic; used identically at index and query time (the
//! BM25 index and the query router both call this), so changing the
//! stopword set or the length cutoff requires a full index rebuild.

use std::collections::HashSet;
use std::sync::OnceLock;

/// Tokens of this length or shorter are dropped.
const MIN_TOKEN_LEN: usize = 3;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "if", "then", "else", "when", "at", "by", "for", "with",
    "about", "against", "between", "into", "through", "during", "before", "after", "above",
    "below", "to", "from", "up", "down", "in", "out", "on", "off", "over", "under", "again",
    "further", "once", "here", "there", "all", "any", "both", "each", "few", "more", "most",
    "other", "some", "such", "nor", "not", "only", "own", "same", "than", "too", "very", "can",
    "will", "just", "should", "now", "is", "are", "was", "were", "be", "been", "being", "have",
    "has", "had", "having", "do", "does", "did", "doing", "would", "could", "ought", "might",
    "must", "shall", "who", "whom", "this", "that", "these", "those", "am", "you", "your",
    "yours", "he", "him", "his", "she", "her", "hers", "it", "its", "they", "them", "their",
    "what", "which", "of", "as", "so",
];

fn stopword_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
}

/// Lowercase, split on non-alphanumeric, drop stopwords and tokens
/// shorter than [`MIN_TOKEN_LEN`].
pub fn tokenize(text: &str) -> Vec<String> {
    let stopwords = stopword_set();
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty() && t.len() > MIN_TOKEN_LEN - 1)
        .filter(|t| !stopwords.contains(t))
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_stopwords_and_short_tokens() {
        let tokens = tokenize("The quick fox is on it");
        assert_eq!(tokens, vec!["quick".to_string(), "fox".to_string()]);
    }

    #[test]
    fn lowercases_and_splits_on_punctuation() {
        let tokens = tokenize("INV-2024-0847");
        assert_eq!(tokens, vec!["inv", "2024", "0847"]);
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
        assert!(tokenize("a an the").is_empty());
    }

    #[test]
    fn is_deterministic() {
        let text = "Meeting with John about the Q4 budget review";
        assert_eq!(tokenize(text), tokenize(text));
    }
}
