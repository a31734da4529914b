//! Vector index capability
//!
//! The core requires a collaborator that embeds and indexes text and
//! answers nearest-neighbor queries; the real implementation (an HNSW
//! index such as the teacher's USearch-backed `VectorIndex` in
//! `search/vector.rs`) lives outside this crate. This module defines the
//! narrow trait `athenaeum-core` depends on, plus a brute-force in-memory
//! reference implementation for tests and the CLI demo.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedder::{cosine_similarity, Embedder};

/// Default similarity threshold used by hybrid retrieval (spec §4.3/§4.4).
pub const DEFAULT_VECTOR_THRESHOLD: f32 = 0.4;

/// One hit returned by [`VectorIndex::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub id: String,
    pub text: String,
    pub score: f32,
    pub source: String,
    pub item_index: u32,
    pub metadata: HashMap<String, String>,
}

/// The capability `HybridRetriever` and `KnowledgeBrain` consume.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn add(&self, id: &str, text: &str, metadata: HashMap<String, String>);

    async fn search(&self, query: &str, max_results: usize, threshold: f32) -> Vec<VectorHit>;
}

struct Entry {
    text: String,
    vector: Vec<f32>,
    metadata: HashMap<String, String>,
}

/// A brute-force cosine-similarity index backed by any [`Embedder`].
///
/// Demo-quality: `O(n)` per search. Useful for tests and the CLI, not a
/// production ANN index (the spec keeps that as an external collaborator).
pub struct BruteForceVectorIndex<E: Embedder> {
    embedder: E,
    entries: RwLock<HashMap<String, Entry>>,
}

impl<E: Embedder> BruteForceVectorIndex<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<E: Embedder> VectorIndex for BruteForceVectorIndex<E> {
    async fn add(&self, id: &str, text: &str, metadata: HashMap<String, String>) {
        let Some(vector) = self.embedder.encode(text).await else {
            return;
        };
        self.entries.write().unwrap().insert(
            id.to_string(),
            Entry {
                text: text.to_string(),
                vector,
                metadata,
            },
        );
    }

    async fn search(&self, query: &str, max_results: usize, threshold: f32) -> Vec<VectorHit> {
        let Some(query_vector) = self.embedder.encode(query).await else {
            return Vec::new();
        };

        let entries = self.entries.read().unwrap();
        let mut scored: Vec<(String, f32, &Entry)> = entries
            .iter()
            .map(|(id, entry)| (id.clone(), cosine_similarity(&query_vector, &entry.vector), entry))
            .filter(|(_, score, _)| *score >= threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(max_results)
            .map(|(id, score, entry)| {
                let source = entry
                    .metadata
                    .get("source")
                    .cloned()
                    .unwrap_or_default();
                let item_index = entry
                    .metadata
                    .get("itemIndex")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                VectorHit {
                    id,
                    text: entry.text.clone(),
                    score,
                    source,
                    item_index,
                    metadata: entry.metadata.clone(),
                }
            })
            .collect()
    }
}

/// A shared handle type callers pass around; `Arc<dyn VectorIndex>` works
/// equally well, this alias just keeps call sites short.
pub type SharedVectorIndex = Arc<dyn VectorIndex>;
