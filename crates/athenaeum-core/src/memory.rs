//! Three-tier memory store
//!
//! Grounded in the teacher's `memory/mod.rs` `MemorySystem` split
//! (episodic/semantic/procedural, Tulving 1972) but stripped of FSRS
//! scheduling and dual-strength decay — this store ranks by embedding
//! similarity and simple recency/confidence weighting instead, per the
//! narrower contract this crate implements. Persistence follows the
//! teacher's atomic write-then-rename pattern from `bm25::index`.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embedder::{cosine_similarity, Embedder};
use crate::error::{MemoryError, MemoryResult};

pub const EPISODIC_CAPACITY: usize = 500;
const CONSOLIDATION_CUTOFF_DAYS: i64 = 90;
const SEMANTIC_RECALL_THRESHOLD: f32 = 0.5;
const EPISODIC_RECALL_THRESHOLD: f32 = 0.6;

/// Category tag attached to a [`SemanticMemory`] at extraction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticCategory {
    Preference,
    PersonalInfo,
    Relationship,
    Opinion,
    Behavior,
}

/// A durable fact about the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticMemory {
    pub id: Uuid,
    pub text: String,
    pub category: SemanticCategory,
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u32,
    pub embedding: Option<Vec<f32>>,
}

/// A record of one past user turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodicMemory {
    pub id: Uuid,
    pub query: String,
    pub response_summary: String,
    pub was_helpful: Option<bool>,
    pub context: String,
    pub timestamp: DateTime<Utc>,
    pub embedding: Option<Vec<f32>>,
}

/// A trigger→behavior rule matched by substring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProceduralMemory {
    pub id: Uuid,
    pub trigger: String,
    pub behavior: String,
    pub examples: Vec<String>,
    pub success_rate: f32,
    pub created_at: DateTime<Utc>,
}

/// One episode surfaced by [`UnifiedMemory::recall`], just enough to format.
#[derive(Debug, Clone)]
pub struct RecalledEpisode {
    pub query: String,
    pub was_helpful: Option<bool>,
}

/// The result of a recall: up to three kinds of memory relevant to a query.
#[derive(Debug, Clone, Default)]
pub struct MemoryContext {
    pub facts: Vec<String>,
    pub episodes: Vec<RecalledEpisode>,
    pub behaviors: Vec<String>,
}

impl MemoryContext {
    /// Render as the Markdown-ish block `ContextAssembler` embeds, or
    /// `None` when there is nothing to say.
    pub fn format_for_prompt(&self) -> Option<String> {
        if self.facts.is_empty() && self.episodes.is_empty() && self.behaviors.is_empty() {
            return None;
        }

        let mut out = String::new();

        if !self.facts.is_empty() {
            out.push_str("## Known facts about the user:\n");
            for fact in &self.facts {
                out.push_str("- ");
                out.push_str(fact);
                out.push('\n');
            }
            out.push('\n');
        }

        if !self.episodes.is_empty() {
            out.push_str("## Similar past interactions:\n");
            for episode in self.episodes.iter().take(3) {
                let preview: String = episode.query.chars().take(80).collect();
                out.push_str("- \"");
                out.push_str(&preview);
                out.push('"');
                if episode.was_helpful == Some(true) {
                    out.push_str(" (worked well)");
                }
                out.push('\n');
            }
            out.push('\n');
        }

        if !self.behaviors.is_empty() {
            out.push_str("## User preferences for this type of request:\n");
            for behavior in &self.behaviors {
                out.push_str("- ");
                out.push_str(behavior);
                out.push('\n');
            }
        }

        Some(out.trim_end().to_string())
    }
}

/// `(pattern, category)` table consulted in order by `process_interaction`.
const EXTRACTION_PATTERNS: &[(&str, SemanticCategory)] = &[
    ("i prefer", SemanticCategory::Preference),
    ("i like", SemanticCategory::Preference),
    ("i don't like", SemanticCategory::Preference),
    ("my favorite", SemanticCategory::Preference),
    ("i work at", SemanticCategory::PersonalInfo),
    ("i am a", SemanticCategory::PersonalInfo),
    ("i live in", SemanticCategory::PersonalInfo),
    ("i think", SemanticCategory::Opinion),
    ("i believe", SemanticCategory::Opinion),
    ("i usually", SemanticCategory::Behavior),
    ("i always", SemanticCategory::Behavior),
];

fn first_sentence_containing<'a>(text: &'a str, pattern: &str) -> Option<&'a str> {
    text.split(['.', '!', '?'])
        .map(|s| s.trim())
        .find(|s| s.to_lowercase().contains(pattern))
}

/// Strip a leading `"I "`/`"i "` and prepend `"The user "`.
fn fact_from_sentence(sentence: &str) -> String {
    let bytes = sentence.as_bytes();
    let stripped = if bytes.len() >= 2 && bytes[1] == b' ' && (bytes[0] == b'I' || bytes[0] == b'i') {
        &sentence[2..]
    } else {
        sentence
    };
    format!("The user {stripped}")
}

/// Owns all three memory vectors exclusively; no other component mutates them.
#[derive(Debug, Default)]
pub struct UnifiedMemory {
    semantic: Vec<SemanticMemory>,
    episodic: Vec<EpisodicMemory>,
    procedural: Vec<ProceduralMemory>,
}

impl UnifiedMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn semantic_count(&self) -> usize {
        self.semantic.len()
    }

    pub fn episodic_count(&self) -> usize {
        self.episodic.len()
    }

    /// Seed a procedural rule. Nothing in `process_interaction` creates
    /// these automatically — the spec leaves their origin external (a
    /// caller observing recurring behavior), so this is the entry point.
    pub fn add_procedural(&mut self, trigger: String, behavior: String, examples: Vec<String>) {
        self.procedural.push(ProceduralMemory {
            id: Uuid::new_v4(),
            trigger,
            behavior,
            examples,
            success_rate: 1.0,
            created_at: Utc::now(),
        });
    }

    /// Embed `query` and rank all three memory stores against it.
    pub async fn recall(
        &mut self,
        query: &str,
        embedder: &dyn Embedder,
        max_facts: usize,
        max_episodes: usize,
    ) -> MemoryContext {
        let query_vector = embedder.encode(query).await;
        let now = Utc::now();

        let facts = match &query_vector {
            Some(q) => self.recall_semantic(q, now, max_facts),
            None => Vec::new(),
        };

        let episodes = match &query_vector {
            Some(q) => self.recall_episodic(q, max_episodes),
            None => Vec::new(),
        };

        let lowered_query = query.to_lowercase();
        let query_tokens: Vec<&str> = lowered_query.split_whitespace().collect();
        let mut behaviors: Vec<(&ProceduralMemory, f32)> = self
            .procedural
            .iter()
            .filter(|p| {
                let trigger = p.trigger.to_lowercase();
                lowered_query.contains(&trigger)
                    || query_tokens.iter().any(|t| trigger.contains(t))
            })
            .map(|p| (p, p.success_rate))
            .collect();
        behaviors.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        MemoryContext {
            facts,
            episodes,
            behaviors: behaviors.into_iter().map(|(p, _)| p.behavior.clone()).collect(),
        }
    }

    fn recall_semantic(&mut self, query_vector: &[f32], now: DateTime<Utc>, max_facts: usize) -> Vec<String> {
        let mut scored: Vec<(usize, f32)> = self
            .semantic
            .iter()
            .enumerate()
            .filter_map(|(i, mem)| {
                let embedding = mem.embedding.as_ref()?;
                let days_since_access = (now - mem.last_accessed).num_seconds() as f32 / 86400.0;
                let recency = 0.7 + 0.3 * (-days_since_access.max(0.0) / 30.0).exp();
                let score = cosine_similarity(query_vector, embedding) * recency * mem.confidence;
                (score > SEMANTIC_RECALL_THRESHOLD).then_some((i, score))
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(max_facts);

        let mut facts = Vec::with_capacity(scored.len());
        for (i, _) in &scored {
            let mem = &mut self.semantic[*i];
            mem.access_count += 1;
            mem.last_accessed = now;
            facts.push(mem.text.clone());
        }
        facts
    }

    fn recall_episodic(&self, query_vector: &[f32], max_episodes: usize) -> Vec<RecalledEpisode> {
        let mut scored: Vec<(&EpisodicMemory, f32)> = self
            .episodic
            .iter()
            .filter_map(|mem| {
                let embedding = mem.embedding.as_ref()?;
                let helpful_boost = if mem.was_helpful == Some(true) { 1.2 } else { 1.0 };
                let score = cosine_similarity(query_vector, embedding) * helpful_boost;
                (score > EPISODIC_RECALL_THRESHOLD).then_some((mem, score))
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(max_episodes)
            .map(|(mem, _)| RecalledEpisode { query: mem.query.clone(), was_helpful: mem.was_helpful })
            .collect()
    }

    /// Extract semantic facts from `user_query`, then append an episodic
    /// record. Embeds both the extracted fact and the query using
    /// `embedder`; a failed embed just leaves that memory un-recallable
    /// by similarity (it is still stored).
    pub async fn process_interaction(
        &mut self,
        user_query: &str,
        assistant_response: &str,
        was_helpful: Option<bool>,
        embedder: &dyn Embedder,
    ) {
        let lowered = user_query.to_lowercase();
        for (pattern, category) in EXTRACTION_PATTERNS {
            if !lowered.contains(pattern) {
                continue;
            }
            let Some(sentence) = first_sentence_containing(user_query, pattern) else {
                continue;
            };
            let fact = fact_from_sentence(sentence);
            let len = fact.chars().count();
            if !(15..=300).contains(&len) {
                continue;
            }
            let fact_lower = fact.to_lowercase();
            if self.semantic.iter().any(|m| m.text.to_lowercase() == fact_lower) {
                continue;
            }

            let embedding = embedder.encode(&fact).await;
            let now = Utc::now();
            self.semantic.push(SemanticMemory {
                id: Uuid::new_v4(),
                text: fact,
                category: *category,
                confidence: 0.7,
                created_at: now,
                last_accessed: now,
                access_count: 0,
                embedding,
            });
            break;
        }

        let response_summary: String = assistant_response.chars().take(200).collect();
        let embedding = embedder.encode(user_query).await;
        self.episodic.push(EpisodicMemory {
            id: Uuid::new_v4(),
            query: user_query.to_string(),
            response_summary,
            was_helpful,
            context: String::new(),
            timestamp: Utc::now(),
            embedding,
        });
        if self.episodic.len() > EPISODIC_CAPACITY {
            self.episodic.remove(0);
        }
    }

    /// Drop stale semantic memories and deduplicate by lowercased-trimmed text.
    pub fn consolidate(&mut self) {
        let now = Utc::now();
        self.semantic.retain(|m| {
            let days_since_access = (now - m.last_accessed).num_days();
            !(days_since_access > CONSOLIDATION_CUTOFF_DAYS && m.confidence < 0.9 && m.access_count <= 5)
        });

        let mut seen = std::collections::HashSet::new();
        self.semantic.retain(|m| seen.insert(m.text.trim().to_lowercase()));
    }

    pub fn save(&self, semantic_path: &Path, episodic_path: &Path, procedural_path: &Path) -> MemoryResult<()> {
        write_json_atomic(semantic_path, &self.semantic)?;
        write_json_atomic(episodic_path, &self.episodic)?;
        write_json_atomic(procedural_path, &self.procedural)?;
        Ok(())
    }

    /// Load the three stores independently; a corrupt or missing file
    /// yields an empty store for that tier rather than failing the whole
    /// load — matching the "initialize must not fail" invariant.
    pub fn load(semantic_path: &Path, episodic_path: &Path, procedural_path: &Path) -> Self {
        Self {
            semantic: read_json_or_empty(semantic_path, "semantic"),
            episodic: read_json_or_empty(episodic_path, "episodic"),
            procedural: read_json_or_empty(procedural_path, "procedural"),
        }
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> MemoryResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| MemoryError::CorruptSnapshot(e.to_string()))?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn read_json_or_empty<T: for<'de> Deserialize<'de> + Default>(path: &Path, label: &str) -> T {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("corrupt {label} memory snapshot at {}: {e}", path.display());
                T::default()
            }
        },
        Err(_) => T::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;

    #[tokio::test]
    async fn extracts_preference_fact_preserving_grammar() {
        let mut memory = UnifiedMemory::new();
        let embedder = HashingEmbedder::default();
        memory
            .process_interaction("I prefer tea over coffee in the morning.", "Noted.", None, &embedder)
            .await;

        assert_eq!(memory.semantic_count(), 1);
        assert_eq!(memory.semantic[0].text, "The user prefer tea over coffee in the morning");
        assert_eq!(memory.semantic[0].category, SemanticCategory::Preference);
        assert_eq!(memory.semantic[0].confidence, 0.7);
    }

    #[tokio::test]
    async fn recall_returns_fact_with_embedding_similarity() {
        let mut memory = UnifiedMemory::new();
        let embedder = HashingEmbedder::default();
        memory
            .process_interaction("I prefer tea over coffee in the morning.", "Noted.", None, &embedder)
            .await;

        let ctx = memory.recall("What do I like to drink?", &embedder, 5, 3).await;
        assert!(ctx.facts.iter().any(|f| f == "The user prefer tea over coffee in the morning"));
        let formatted = ctx.format_for_prompt().unwrap();
        assert!(formatted.contains("- The user prefer tea over coffee in the morning"));
    }

    #[tokio::test]
    async fn episodic_capacity_is_bounded() {
        let mut memory = UnifiedMemory::new();
        let embedder = HashingEmbedder::default();
        for i in 0..520 {
            memory
                .process_interaction(&format!("random query number {i}"), "ok", None, &embedder)
                .await;
        }
        assert_eq!(memory.episodic_count(), EPISODIC_CAPACITY);
    }

    #[tokio::test]
    async fn no_pattern_match_creates_no_semantic_memory() {
        let mut memory = UnifiedMemory::new();
        let embedder = HashingEmbedder::default();
        memory.process_interaction("What time is it?", "It's noon.", None, &embedder).await;
        assert_eq!(memory.semantic_count(), 0);
        assert_eq!(memory.episodic_count(), 1);
    }

    #[test]
    fn format_for_prompt_is_none_when_all_empty() {
        let ctx = MemoryContext::default();
        assert!(ctx.format_for_prompt().is_none());
    }

    #[test]
    fn consolidate_drops_stale_low_confidence_unused_facts() {
        let mut memory = UnifiedMemory::new();
        let stale_time = Utc::now() - chrono::Duration::days(120);
        memory.semantic.push(SemanticMemory {
            id: Uuid::new_v4(),
            text: "The user likes jazz".to_string(),
            category: SemanticCategory::Preference,
            confidence: 0.7,
            created_at: stale_time,
            last_accessed: stale_time,
            access_count: 1,
            embedding: None,
        });
        memory.consolidate();
        assert_eq!(memory.semantic_count(), 0);
    }

    #[test]
    fn consolidate_deduplicates_by_lowercased_text() {
        let mut memory = UnifiedMemory::new();
        for _ in 0..2 {
            memory.semantic.push(SemanticMemory {
                id: Uuid::new_v4(),
                text: "The user likes jazz".to_string(),
                category: SemanticCategory::Preference,
                confidence: 0.95,
                created_at: Utc::now(),
                last_accessed: Utc::now(),
                access_count: 10,
                embedding: None,
            });
        }
        memory.consolidate();
        assert_eq!(memory.semantic_count(), 1);
    }
}
