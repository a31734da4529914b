//! Query router
//!
//! Classifies query intent without calling an LLM — a latency-critical,
//! deterministic gate. Grounded in the teacher's `HybridSearcher::
//! should_use_semantic` heuristic (`search/hybrid.rs`), generalized from a
//! single semantic/keyword toggle into the closed four-intent classifier
//! the spec requires.

use std::collections::HashSet;

/// The closed set of query intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Personal,
    Memory,
    General,
    Hybrid,
}

/// Depth of retrieval-augmented generation permitted for a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RagDepth {
    None,
    Light,
    Full,
}

/// The retrieval plan a caller should follow for a classified query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Strategy {
    pub use_rag: bool,
    pub use_memory: bool,
    pub depth: RagDepth,
    pub max_results: usize,
}

/// The output of [`QueryRouter::classify`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f64,
}

impl Intent {
    /// The retrieval strategy bound to this intent (spec §4.5 table).
    pub fn strategy(self) -> Strategy {
        match self {
            Intent::Personal => Strategy { use_rag: true, use_memory: true, depth: RagDepth::Full, max_results: 10 },
            Intent::Memory => Strategy { use_rag: false, use_memory: true, depth: RagDepth::None, max_results: 0 },
            Intent::General => Strategy { use_rag: false, use_memory: false, depth: RagDepth::None, max_results: 0 },
            Intent::Hybrid => Strategy { use_rag: true, use_memory: true, depth: RagDepth::Light, max_results: 3 },
        }
    }
}

struct IntentKeywords {
    intent: Intent,
    tokens: &'static [&'static str],
    phrases: &'static [&'static str],
}

const KEYWORD_TABLE: &[IntentKeywords] = &[
    IntentKeywords {
        intent: Intent::Personal,
        tokens: &[
            "my", "i", "me", "mine", "our", "we", "email", "emails", "meeting", "meetings",
            "notes", "note", "calendar", "document", "documents", "file", "files", "yesterday",
            "wrote", "scheduled", "appointment", "project", "task", "todo", "reminder",
        ],
        phrases: &["told me", "sent me", "last week", "last month"],
    },
    IntentKeywords {
        intent: Intent::Memory,
        tokens: &[
            "favorite", "favourite", "prefer", "preference", "like", "dislike", "usually",
            "always", "never", "habit", "routine",
        ],
        phrases: &["remember when", "last time i"],
    },
    IntentKeywords {
        intent: Intent::General,
        tokens: &[
            "explain", "define", "typically", "science", "math", "calculate", "code",
            "programming", "algorithm", "function",
        ],
        phrases: &["what is", "who is", "how does", "in general"],
    },
    IntentKeywords {
        intent: Intent::Hybrid,
        tokens: &["draft", "compose", "prepare", "suggest", "recommend", "advice"],
        phrases: &["help me write", "should i", "what should i"],
    },
];

/// Deterministic, keyword-based intent classifier.
pub struct QueryRouter;

impl QueryRouter {
    pub fn new() -> Self {
        Self
    }

    /// Classify `query`. Pure and referentially transparent.
    pub fn classify(&self, query: &str) -> Classification {
        let lowered = query.to_lowercase();
        let token_set: HashSet<&str> = lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let mut counts = [0usize; 4];
        for (i, entry) in KEYWORD_TABLE.iter().enumerate() {
            let token_hits = entry.tokens.iter().filter(|t| token_set.contains(*t)).count();
            let phrase_hits = entry.phrases.iter().filter(|p| lowered.contains(*p)).count();
            counts[i] = token_hits + phrase_hits;
        }

        let (best_idx, best_count) = counts
            .iter()
            .enumerate()
            .max_by_key(|(_, c)| **c)
            .map(|(i, c)| (i, *c))
            .unwrap();
        let total = counts.iter().sum::<usize>().max(1);

        if best_count == 0 {
            return Classification { intent: Intent::Hybrid, confidence: 0.5 };
        }

        let best_intent = KEYWORD_TABLE[best_idx].intent;
        let confidence = if best_count >= 2 {
            (best_count as f64 / total as f64 + 0.3).min(0.95)
        } else {
            (best_count as f64 / total as f64 + 0.2).min(0.95)
        };

        Classification { intent: best_intent, confidence }
    }
}

impl Default for QueryRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_query_skips_retrieval() {
        let router = QueryRouter::new();
        let c = router.classify("Explain how photosynthesis works");
        assert_eq!(c.intent, Intent::General);
        assert!(c.confidence >= 0.55);
        let strategy = c.intent.strategy();
        assert!(!strategy.use_rag);
        assert!(!strategy.use_memory);
    }

    #[test]
    fn ambiguous_query_defaults_to_hybrid_with_half_confidence() {
        let router = QueryRouter::new();
        let c = router.classify("xyzzy plugh");
        assert_eq!(c.intent, Intent::Hybrid);
        assert_eq!(c.confidence, 0.5);
    }

    #[test]
    fn personal_keywords_route_to_personal() {
        let router = QueryRouter::new();
        let c = router.classify("What did I write in my meeting notes yesterday?");
        assert_eq!(c.intent, Intent::Personal);
        assert!(c.confidence <= 0.95);
    }

    #[test]
    fn memory_phrase_routes_to_memory() {
        let router = QueryRouter::new();
        let c = router.classify("do you remember when we talked about this");
        assert_eq!(c.intent, Intent::Memory);
    }

    #[test]
    fn classification_is_referentially_transparent() {
        let router = QueryRouter::new();
        let q = "should I draft a budget proposal";
        assert_eq!(router.classify(q), router.classify(q));
    }

    #[test]
    fn confidence_is_always_bounded() {
        let router = QueryRouter::new();
        for q in [
            "what is the meaning of life",
            "my email my notes my calendar my meeting",
            "",
            "help me write a reminder for my meeting",
        ] {
            let c = router.classify(q);
            assert!(c.confidence >= 0.0 && c.confidence <= 0.95);
        }
    }

    #[test]
    fn use_rag_false_implies_zero_results_and_no_depth() {
        for intent in [Intent::Memory, Intent::General] {
            let strategy = intent.strategy();
            assert!(!strategy.use_rag);
            assert_eq!(strategy.max_results, 0);
            assert_eq!(strategy.depth, RagDepth::None);
        }
    }

    #[test]
    fn strategy_table_matches_spec() {
        assert_eq!(
            Intent::Personal.strategy(),
            Strategy { use_rag: true, use_memory: true, depth: RagDepth::Full, max_results: 10 }
        );
        assert_eq!(
            Intent::Hybrid.strategy(),
            Strategy { use_rag: true, use_memory: true, depth: RagDepth::Light, max_results: 3 }
        );
    }
}
