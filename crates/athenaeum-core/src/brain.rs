//! Unified ingestion and retrieval facade
//!
//! Grounded in the teacher's `Storage` (`storage/mod.rs`): one owner for
//! the durable indices, a chunking step ahead of insertion, and a
//! "load failure degrades to empty, never panics" policy. Generalized
//! from the teacher's single FTS5+HNSW pair to this crate's
//! BM25+`VectorIndex` pair plus the optional graph pass-through.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::bm25::Bm25Index;
use crate::chunk::{chunk_text, Category, DocumentChunk, Fingerprint};
use crate::config::EngineConfig;
use crate::error::{BrainError, Result};
use crate::graph::{GraphExpander, KnowledgeGraph};
use crate::hybrid::{HybridRetriever, RetrievalResult};
use crate::router::{QueryRouter, RagDepth};
use crate::vector::VectorIndex;

/// One update emitted by [`KnowledgeBrain::ingest`]'s progress callback.
#[derive(Debug, Clone)]
pub struct IngestProgress {
    pub fraction: f64,
    pub stage: String,
}

impl IngestProgress {
    fn new(fraction: f64, stage: impl Into<String>) -> Self {
        Self { fraction, stage: stage.into() }
    }
}

/// Where a brain's durable state lives on disk.
#[derive(Debug, Clone)]
pub struct BrainPaths {
    pub bm25_index: PathBuf,
    pub metadata: PathBuf,
    pub knowledge_graph: PathBuf,
}

/// Owns the BM25 index, chunk metadata table, and a vector-index handle.
/// The knowledge graph is shared read-only.
pub struct KnowledgeBrain {
    bm25: Bm25Index,
    metadata: HashMap<Fingerprint, DocumentChunk>,
    vector_index: Arc<dyn VectorIndex>,
    graph: Option<Arc<KnowledgeGraph>>,
    config: EngineConfig,
    router: QueryRouter,
    hybrid: HybridRetriever,
    graph_expander: GraphExpander,
}

impl KnowledgeBrain {
    pub fn new(config: EngineConfig, vector_index: Arc<dyn VectorIndex>) -> Self {
        Self {
            bm25: Bm25Index::new(),
            metadata: HashMap::new(),
            vector_index,
            graph: None,
            config,
            router: QueryRouter::new(),
            hybrid: HybridRetriever::new(),
            graph_expander: GraphExpander::new(),
        }
    }

    /// Load existing state from `paths`. Any I/O or parse failure on an
    /// individual file is logged and that piece starts empty — the brain
    /// must boot even with a corrupt snapshot on disk.
    pub fn load(paths: &BrainPaths, config: EngineConfig, vector_index: Arc<dyn VectorIndex>) -> Self {
        let bm25 = Bm25Index::load(&paths.bm25_index).unwrap_or_else(|e| {
            warn!("bm25 snapshot at {} unreadable, starting empty: {e}", paths.bm25_index.display());
            Bm25Index::new()
        });

        let metadata = std::fs::read_to_string(&paths.metadata)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_else(|| {
                warn!("chunk metadata at {} unreadable, starting empty", paths.metadata.display());
                HashMap::new()
            });

        let graph = Self::load_graph(&paths.knowledge_graph, &config);

        Self {
            bm25,
            metadata,
            vector_index,
            graph,
            config,
            router: QueryRouter::new(),
            hybrid: HybridRetriever::new(),
            graph_expander: GraphExpander::new(),
        }
    }

    #[cfg(feature = "graph")]
    fn load_graph(path: &Path, config: &EngineConfig) -> Option<Arc<KnowledgeGraph>> {
        if !config.graph_rag_enabled || !path.exists() {
            return None;
        }
        match KnowledgeGraph::load_sqlite(path) {
            Ok(graph) => Some(Arc::new(graph)),
            Err(e) => {
                warn!("knowledge graph at {} unreadable, continuing without it: {e}", path.display());
                None
            }
        }
    }

    #[cfg(not(feature = "graph"))]
    fn load_graph(_path: &Path, _config: &EngineConfig) -> Option<Arc<KnowledgeGraph>> {
        None
    }

    pub fn set_graph(&mut self, graph: Arc<KnowledgeGraph>) {
        self.graph = Some(graph);
    }

    pub fn chunk_count(&self) -> usize {
        self.bm25.document_count()
    }

    /// Chunk, index, and persist `content`. Chunks already committed to
    /// the in-memory indices stay committed even if the final save fails
    /// — only the save failure is surfaced to the caller.
    pub async fn ingest(
        &mut self,
        content: &str,
        source: &str,
        category: Option<Category>,
        metadata: HashMap<String, String>,
        paths: &BrainPaths,
        mut progress_cb: impl FnMut(IngestProgress),
    ) -> Result<usize> {
        progress_cb(IngestProgress::new(0.0, "Chunking content…"));
        let chunks = chunk_text(content, self.config.chunk_size);
        let n = chunks.len();

        for (i, chunk) in chunks.into_iter().enumerate() {
            let fingerprint = Fingerprint::new_v4();
            self.bm25.add_document(fingerprint, &chunk, source, i as u32);

            let mut vector_meta = metadata.clone();
            vector_meta.insert("source".to_string(), source.to_string());
            vector_meta.insert("itemIndex".to_string(), i.to_string());
            if let Some(cat) = category {
                vector_meta.insert("category".to_string(), format!("{cat:?}").to_lowercase());
            }
            self.vector_index.add(&fingerprint.to_string(), &chunk, vector_meta).await;

            let mut record = DocumentChunk::new(chunk, source.to_string(), category, i as u32);
            record.id = fingerprint;
            record.custom_metadata = metadata.clone();
            self.metadata.insert(fingerprint, record);

            let fraction = if n == 0 { 1.0 } else { (i + 1) as f64 / n as f64 };
            progress_cb(IngestProgress::new(fraction, format!("Indexing chunk {} of {n}", i + 1)));
        }

        progress_cb(IngestProgress::new(1.0, "Saving indices…"));
        self.bm25.save(&paths.bm25_index)?;
        let metadata_json = serde_json::to_string_pretty(&self.metadata)
            .map_err(|e| BrainError::CorruptSnapshot(e.to_string()))?;
        let tmp = paths.metadata.with_extension("json.tmp");
        std::fs::write(&tmp, metadata_json)?;
        std::fs::rename(&tmp, &paths.metadata)?;

        progress_cb(IngestProgress::new(1.0, "Complete"));
        Ok(n)
    }

    /// Route `query` through `QueryRouter`, then retrieve per the derived
    /// strategy. Returns empty immediately when the strategy has no RAG.
    pub async fn retrieve(
        &self,
        query: &str,
        max_results: usize,
        category_filter: Option<&[Category]>,
    ) -> Vec<RetrievalResult> {
        let classification = self.router.classify(query);
        let strategy = classification.intent.strategy();
        if !strategy.use_rag {
            return Vec::new();
        }

        let count = match strategy.depth {
            RagDepth::Light => max_results.min(3),
            _ => max_results,
        };
        if count == 0 {
            return Vec::new();
        }

        let mut results = self.run_hybrid(query, 2 * count).await;
        results = self.apply_category_filter(results, category_filter);
        results.truncate(count);

        if strategy.depth == RagDepth::Full && self.config.graph_rag_enabled {
            if let Some(graph) = &self.graph {
                results = self.graph_expander.expand(results, graph, count, None);
            }
        }

        results
    }

    /// Same pipeline as `retrieve`, bypassing the router — used directly
    /// by tests and callers that already know their strategy.
    pub async fn search_direct(
        &self,
        query: &str,
        top_k: usize,
        category_filter: Option<&[Category]>,
    ) -> Vec<RetrievalResult> {
        let mut results = self.run_hybrid(query, 2 * top_k).await;
        results = self.apply_category_filter(results, category_filter);
        results.truncate(top_k);
        results
    }

    async fn run_hybrid(&self, query: &str, fetch: usize) -> Vec<RetrievalResult> {
        let mut results = match self.config.hybrid_vector_weight {
            Some(weight) if self.config.use_hybrid_search => {
                self.hybrid.search_weighted(query, self.vector_index.as_ref(), &self.bm25, fetch, weight).await
            }
            Some(_) | None if self.config.use_hybrid_search => {
                self.hybrid.search(query, self.vector_index.as_ref(), &self.bm25, fetch).await
            }
            _ => Vec::new(),
        };
        for result in &mut results {
            result.category = self.metadata.get(&result.fingerprint).and_then(|c| c.category);
        }
        results
    }

    fn apply_category_filter(
        &self,
        results: Vec<RetrievalResult>,
        category_filter: Option<&[Category]>,
    ) -> Vec<RetrievalResult> {
        match category_filter {
            None => results,
            Some(allowed) => results.into_iter().filter(|r| r.category.is_some_and(|c| allowed.contains(&c))).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;
    use crate::vector::BruteForceVectorIndex;

    fn brain() -> KnowledgeBrain {
        let vector_index: Arc<dyn VectorIndex> = Arc::new(BruteForceVectorIndex::new(HashingEmbedder::default()));
        KnowledgeBrain::new(EngineConfig::default(), vector_index)
    }

    fn paths(dir: &std::path::Path) -> BrainPaths {
        BrainPaths {
            bm25_index: dir.join("bm25_index.json"),
            metadata: dir.join("metadata.json"),
            knowledge_graph: dir.join("knowledge_graph.sqlite"),
        }
    }

    #[tokio::test]
    async fn ingest_then_search_direct_finds_the_chunk() {
        let mut brain = brain();
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path());
        let mut stages = Vec::new();
        brain
            .ingest(
                "Invoice number INV-2024-0847 from ACME Corp for five thousand dollars.",
                "documents",
                Some(Category::Documents),
                HashMap::new(),
                &paths,
                |p| stages.push(p.stage),
            )
            .await
            .unwrap();

        assert!(stages.iter().any(|s| s == "Complete"));
        assert_eq!(brain.chunk_count(), 1);

        let results = brain.search_direct("INV-2024-0847", 5, None).await;
        assert!(!results.is_empty());
        assert_eq!(results[0].category, Some(Category::Documents));
    }

    #[tokio::test]
    async fn general_query_returns_no_retrieval_results() {
        let mut brain = brain();
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path());
        brain
            .ingest("some personal notes about my meeting", "notes", None, HashMap::new(), &paths, |_| {})
            .await
            .unwrap();

        let results = brain.retrieve("Explain how photosynthesis works", 10, None).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn category_filter_drops_nonmatching_chunks() {
        let mut brain = brain();
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path());
        brain
            .ingest("budget review meeting notes", "calendar", Some(Category::Calendar), HashMap::new(), &paths, |_| {})
            .await
            .unwrap();

        let results = brain.search_direct("budget review meeting", 5, Some(&[Category::Email])).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn load_with_missing_files_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path());
        let vector_index: Arc<dyn VectorIndex> = Arc::new(BruteForceVectorIndex::new(HashingEmbedder::default()));
        let brain = KnowledgeBrain::load(&paths, EngineConfig::default(), vector_index);
        assert_eq!(brain.chunk_count(), 0);
    }
}
