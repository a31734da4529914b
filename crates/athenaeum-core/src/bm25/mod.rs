//! BM25 keyword index
//!
//! An inverted index over chunk text with Okapi BM25 scoring and a
//! durable snapshot. Grounded in the teacher's `HybridSearcher`/keyword
//! search split (`search/mod.rs`): the scoring math lives here rather than
//! in SQLite FTS5 since the spec requires a standalone, persistable index.

mod index;

pub use index::{Bm25Index, Bm25Snapshot, ScoredDocument};
