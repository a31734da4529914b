//! Hybrid retriever
//!
//! Runs BM25 and vector search concurrently and fuses the two ranked
//! lists. Grounded in the teacher's `search/hybrid.rs`
//! (`reciprocal_rank_fusion`/`linear_combination`), generalized from
//! `(String, f32)` pairs to chunk-shaped results keyed by `(source,
//! chunk_index)` as the spec requires, and taught to run the two searches
//! concurrently with `tokio::join!` rather than sequentially.

use std::collections::HashMap;

use crate::bm25::Bm25Index;
use crate::chunk::Category;
use crate::vector::VectorIndex;

/// RRF fusion constant (spec default 60).
pub const RRF_K: f64 = 60.0;

/// How a [`RetrievalResult`] was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Semantic,
    Keyword,
    Hybrid,
    GraphExpanded,
}

/// A fused search result.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub fingerprint: uuid::Uuid,
    pub text: String,
    pub source: String,
    pub category: Option<Category>,
    pub chunk_index: u32,
    pub fused_score: f64,
    pub match_type: MatchType,
    pub entity_context: Option<Vec<String>>,
    pub community_summary: Option<String>,
}

#[derive(Debug, Clone)]
struct Candidate {
    fingerprint: uuid::Uuid,
    text: String,
    source: String,
    chunk_index: u32,
    vector_rank: Option<usize>,
    vector_score: Option<f64>,
    bm25_rank: Option<usize>,
    bm25_score: Option<f64>,
}

impl Candidate {
    fn match_type(&self) -> MatchType {
        match (self.vector_rank, self.bm25_rank) {
            (Some(_), Some(_)) => MatchType::Hybrid,
            (None, Some(_)) => MatchType::Keyword,
            (Some(_), None) => MatchType::Semantic,
            (None, None) => unreachable!("candidate must come from at least one list"),
        }
    }
}

/// Runs keyword and vector search concurrently, fuses, and ranks.
pub struct HybridRetriever;

impl HybridRetriever {
    pub fn new() -> Self {
        Self
    }

    /// Reciprocal Rank Fusion over the `(source, chunk_index)` key.
    pub async fn search(
        &self,
        query: &str,
        vector_index: &dyn VectorIndex,
        bm25_index: &Bm25Index,
        top_k: usize,
    ) -> Vec<RetrievalResult> {
        let fetch = 2 * top_k;
        let (vector_hits, bm25_hits) = tokio::join!(
            vector_index.search(query, fetch, crate::vector::DEFAULT_VECTOR_THRESHOLD),
            async { bm25_index.search(query, fetch) }
        );

        let mut candidates: HashMap<(String, u32), Candidate> = HashMap::new();

        for (rank, hit) in bm25_hits.iter().enumerate() {
            let key = (hit.source.clone(), hit.chunk_index);
            let entry = candidates.entry(key).or_insert_with(|| Candidate {
                fingerprint: hit.id,
                text: hit.text.clone(),
                source: hit.source.clone(),
                chunk_index: hit.chunk_index,
                vector_rank: None,
                vector_score: None,
                bm25_rank: None,
                bm25_score: None,
            });
            entry.bm25_rank = Some(rank + 1);
            entry.bm25_score = Some(hit.score);
        }

        for (rank, hit) in vector_hits.iter().enumerate() {
            let item_index = hit.item_index;
            let key = (hit.source.clone(), item_index);
            let entry = candidates.entry(key).or_insert_with(|| Candidate {
                fingerprint: hit.id.parse().unwrap_or_else(|_| uuid::Uuid::new_v4()),
                text: hit.text.clone(),
                source: hit.source.clone(),
                chunk_index: item_index,
                vector_rank: None,
                vector_score: None,
                bm25_rank: None,
                bm25_score: None,
            });
            entry.vector_rank = Some(rank + 1);
            entry.vector_score = Some(hit.score as f64);
        }

        let mut ranked: Vec<(f64, Candidate)> = candidates
            .into_values()
            .map(|c| {
                let mut fused = 0.0;
                if let Some(r) = c.vector_rank {
                    fused += 1.0 / (RRF_K + r as f64);
                }
                if let Some(r) = c.bm25_rank {
                    fused += 1.0 / (RRF_K + r as f64);
                }
                (fused, c)
            })
            .collect();

        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        ranked
            .into_iter()
            .take(top_k)
            .map(|(fused, c)| RetrievalResult {
                match_type: c.match_type(),
                fingerprint: c.fingerprint,
                text: c.text,
                source: c.source,
                category: None,
                chunk_index: c.chunk_index,
                fused_score: fused,
                entity_context: None,
                community_summary: None,
            })
            .collect()
    }

    /// Weighted linear combination of score-normalized lists.
    pub async fn search_weighted(
        &self,
        query: &str,
        vector_index: &dyn VectorIndex,
        bm25_index: &Bm25Index,
        top_k: usize,
        vector_weight: f64,
    ) -> Vec<RetrievalResult> {
        let vector_weight = vector_weight.clamp(0.0, 1.0);
        let keyword_weight = 1.0 - vector_weight;
        let fetch = 2 * top_k;

        let (vector_hits, bm25_hits) = tokio::join!(
            vector_index.search(query, fetch, crate::vector::DEFAULT_VECTOR_THRESHOLD),
            async { bm25_index.search(query, fetch) }
        );

        let max_vector = vector_hits
            .iter()
            .map(|h| h.score as f64)
            .fold(0.0_f64, f64::max)
            .max(0.001);
        let max_bm25 = bm25_hits.iter().map(|h| h.score).fold(0.0_f64, f64::max).max(0.001);

        let mut candidates: HashMap<(String, u32), Candidate> = HashMap::new();

        for hit in &bm25_hits {
            let key = (hit.source.clone(), hit.chunk_index);
            let entry = candidates.entry(key).or_insert_with(|| Candidate {
                fingerprint: hit.id,
                text: hit.text.clone(),
                source: hit.source.clone(),
                chunk_index: hit.chunk_index,
                vector_rank: None,
                vector_score: None,
                bm25_rank: Some(0),
                bm25_score: None,
            });
            entry.bm25_rank = Some(1);
            entry.bm25_score = Some(hit.score / max_bm25);
        }

        for hit in &vector_hits {
            let key = (hit.source.clone(), hit.item_index);
            let entry = candidates.entry(key).or_insert_with(|| Candidate {
                fingerprint: hit.id.parse().unwrap_or_else(|_| uuid::Uuid::new_v4()),
                text: hit.text.clone(),
                source: hit.source.clone(),
                chunk_index: hit.item_index,
                vector_rank: Some(1),
                vector_score: None,
                bm25_rank: None,
                bm25_score: None,
            });
            entry.vector_rank = Some(1);
            entry.vector_score = Some(hit.score as f64 / max_vector);
        }

        let mut ranked: Vec<(f64, Candidate)> = candidates
            .into_values()
            .map(|c| {
                let combined = c.vector_score.unwrap_or(0.0) * vector_weight
                    + c.bm25_score.unwrap_or(0.0) * keyword_weight;
                (combined, c)
            })
            .collect();

        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        ranked
            .into_iter()
            .take(top_k)
            .map(|(combined, c)| RetrievalResult {
                match_type: c.match_type(),
                fingerprint: c.fingerprint,
                text: c.text,
                source: c.source,
                category: None,
                chunk_index: c.chunk_index,
                fused_score: combined,
                entity_context: None,
                community_summary: None,
            })
            .collect()
    }
}

impl Default for HybridRetriever {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;
    use crate::vector::BruteForceVectorIndex;
    use uuid::Uuid;

    /// Returns fixed, hand-picked vectors for a small set of known inputs
    /// so the vector-side ranking in a test is pinned by construction
    /// rather than by incidental hashing behavior.
    struct FixedEmbedder;

    #[async_trait::async_trait]
    impl crate::embedder::Embedder for FixedEmbedder {
        async fn encode(&self, text: &str) -> Option<Vec<f32>> {
            match text {
                "zulu yankee xray quebec" => Some(vec![1.0, 0.0]),
                "vector-doc-b" => Some(vec![1.0, 0.0]),
                "vector-doc-d" => Some(vec![0.6, 0.8]),
                _ => None,
            }
        }
    }

    #[tokio::test]
    async fn rrf_scores_match_spec_formula() {
        // Scenario E3: bm25 list [doc_A, doc_B] at ranks 1,2; vector list
        // [doc_B, doc_D] at ranks 1,2. Expected fused scores: doc_A =
        // 1/61, doc_B = 1/61 + 1/62, doc_D = 1/62; final order doc_B,
        // doc_A, doc_D.
        //
        // The bm25 ranking is pinned by construction: doc_A contains every
        // query term, doc_B only a subset, so doc_A's score is strictly
        // the sum of doc_B's matching terms plus two more positive terms
        // (idf is always positive for df < N) — doc_A outranks doc_B for
        // any token frequencies. The vector ranking is pinned directly via
        // `FixedEmbedder`, sidestepping hashing-based similarity entirely.
        let mut bm25 = Bm25Index::new();
        let id_a = Uuid::new_v4();
        let id_b = Uuid::new_v4();
        bm25.add_document(id_a, "zulu yankee xray quebec", "doc-a", 0);
        bm25.add_document(id_b, "zulu yankee", "doc-b", 0);

        let vector = BruteForceVectorIndex::new(FixedEmbedder);
        vector
            .add(
                &id_b.to_string(),
                "vector-doc-b",
                [("source".into(), "doc-b".into()), ("itemIndex".into(), "0".into())].into(),
            )
            .await;
        let id_d = Uuid::new_v4();
        vector
            .add(
                &id_d.to_string(),
                "vector-doc-d",
                [("source".into(), "doc-d".into()), ("itemIndex".into(), "0".into())].into(),
            )
            .await;

        let retriever = HybridRetriever::new();
        let results = retriever.search("zulu yankee xray quebec", &vector, &bm25, 10).await;

        let score = |source: &str| -> f64 {
            results.iter().find(|r| r.source == source).map(|r| r.fused_score).unwrap()
        };

        assert!((score("doc-a") - 1.0 / 61.0).abs() < 1e-12);
        assert!((score("doc-b") - (1.0 / 61.0 + 1.0 / 62.0)).abs() < 1e-12);
        assert!((score("doc-d") - 1.0 / 62.0).abs() < 1e-12);

        let order: Vec<&str> = results.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(order, vec!["doc-b", "doc-a", "doc-d"]);
    }

    #[tokio::test]
    async fn empty_lists_yield_empty_results() {
        let bm25 = Bm25Index::new();
        let vector = BruteForceVectorIndex::new(HashingEmbedder::default());
        let retriever = HybridRetriever::new();
        let results = retriever.search("anything", &vector, &bm25, 10).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn match_type_reflects_which_lists_contained_the_document() {
        let mut bm25 = Bm25Index::new();
        let id = Uuid::new_v4();
        bm25.add_document(id, "unique keyword only content here", "keyword-doc", 0);
        let vector = BruteForceVectorIndex::new(HashingEmbedder::default());

        let retriever = HybridRetriever::new();
        let results = retriever.search("unique keyword only content", &vector, &bm25, 10).await;
        assert_eq!(results[0].match_type, MatchType::Keyword);
    }
}
