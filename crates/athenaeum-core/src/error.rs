//! Error taxonomy
//!
//! Mirrors the teacher's per-subsystem `thiserror` enums (`StorageError`,
//! `VectorSearchError`, `EmbeddingError`): each subsystem gets its own enum
//! rather than one crate-wide catch-all, so callers can match on the kinds
//! that matter to them.

use thiserror::Error;

/// Errors from `BM25Index` persistence and search.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BrainError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("retrieval requested before initialize() completed")]
    NotReady,

    #[error("external collaborator failed: {0}")]
    ExternalFailure(String),
}

pub type Result<T> = std::result::Result<T, BrainError>;

/// Errors from the three-tier memory store.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

pub type MemoryResult<T> = std::result::Result<T, MemoryError>;

/// Errors from loading a read-only knowledge graph.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GraphError {
    #[cfg(feature = "graph")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt graph: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;
