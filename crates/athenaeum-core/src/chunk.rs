//! Document chunk data model
//!
//! The chunk is the atomic unit indexed by [`crate::bm25::Bm25Index`] and
//! the vector index alike. `(source, chunk_index)` uniquely identifies a
//! chunk; the fingerprint is the primary key every index actually stores.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A 128-bit chunk identifier, stable across restarts after a successful save.
pub type Fingerprint = Uuid;

/// The category tag attached to a chunk at ingestion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Email,
    Notes,
    Documents,
    Calendar,
    Messages,
    Web,
    Other,
}

/// The indexed unit: a contiguous, sentence-aligned span of source text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentChunk {
    pub id: Fingerprint,
    pub text: String,
    pub source: String,
    pub category: Option<Category>,
    pub chunk_index: u32,
    pub timestamp: DateTime<Utc>,
    pub custom_metadata: HashMap<String, String>,
}

impl DocumentChunk {
    pub fn new(text: String, source: String, category: Option<Category>, chunk_index: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            source,
            category,
            chunk_index,
            timestamp: Utc::now(),
            custom_metadata: HashMap::new(),
        }
    }
}

/// Greedily split `content` into chunks no longer than `target_size`
/// characters (a single oversized sentence becomes its own chunk).
///
/// Splits on `.!?\n`; trims whitespace; drops empty fragments. Pure
/// function — no I/O, no fingerprint assignment (that happens at
/// ingestion, where each chunk gets its own fresh identifier).
pub fn chunk_text(content: &str, target_size: usize) -> Vec<String> {
    let sentences: Vec<&str> = content
        .split(|c: char| c == '.' || c == '!' || c == '?' || c == '\n')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in sentences {
        if sentence.len() > target_size {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.push(sentence.to_string());
            continue;
        }

        let candidate_len = if current.is_empty() {
            sentence.len()
        } else {
            current.len() + 2 + sentence.len() // ". " separator
        };

        if candidate_len > target_size && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if current.is_empty() {
            current.push_str(sentence);
        } else {
            current.push_str(". ");
            current.push_str(sentence);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
