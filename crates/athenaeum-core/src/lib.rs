//! Local-first personal-knowledge retrieval engine.
//!
//! Given a natural-language query, decides whether to consult the user's
//! private corpus, runs hybrid keyword/vector retrieval, optionally
//! expands results through a knowledge graph, recalls relevant long-term
//! memory, and packs everything into a token-budgeted prompt block for a
//! downstream language model. No network calls, no remote index.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use athenaeum_core::{BrainIntegration, EngineConfig, ContextBudget};
//!
//! let mut brain = BrainIntegration::new(/* ... */);
//! let (prompt, source_count) = brain.process_message("What's on my calendar?", false, &[]).await;
//! ```

pub mod assembler;
pub mod bm25;
pub mod brain;
pub mod chunk;
pub mod config;
pub mod embedder;
pub mod error;
pub mod graph;
pub mod hybrid;
pub mod integration;
pub mod memory;
pub mod router;
pub mod tokenizer;
pub mod vector;

pub use assembler::{AssembledContext, ContextAssembler, ConversationTurn, Role};
pub use bm25::{Bm25Index, Bm25Snapshot, ScoredDocument};
pub use brain::{BrainPaths, IngestProgress, KnowledgeBrain};
pub use chunk::{chunk_text, Category, DocumentChunk, Fingerprint};
pub use config::{ContextBudget, EngineConfig};
pub use embedder::{cosine_similarity, CachedEmbedder, Embedder, HashingEmbedder};
pub use error::{BrainError, GraphError, GraphResult, MemoryError, MemoryResult, Result};
pub use graph::{Community, Entity, GraphExpander, KnowledgeGraph, Relationship};
pub use hybrid::{HybridRetriever, MatchType, RetrievalResult, RRF_K};
pub use integration::{BrainIntegration, MemoryPaths, WebResult, WebSearch};
pub use memory::{
    EpisodicMemory, MemoryContext, ProceduralMemory, RecalledEpisode, SemanticCategory, SemanticMemory,
    UnifiedMemory,
};
pub use router::{Classification, Intent, QueryRouter, RagDepth, Strategy};
pub use tokenizer::tokenize;
pub use vector::{BruteForceVectorIndex, SharedVectorIndex, VectorHit, VectorIndex, DEFAULT_VECTOR_THRESHOLD};
