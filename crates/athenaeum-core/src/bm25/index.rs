use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chunk::Fingerprint;
use crate::error::{BrainError, Result};
use crate::tokenizer::tokenize;

const K1: f64 = 1.5;
const B: f64 = 0.75;

/// The subset of a [`Bm25Index`] that is actually persisted. The inverted
/// index, length table, and running average are rebuilt on load by
/// replaying these records through `add_document` in order — this keeps
/// the serialized form robust to changes in the in-memory layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Snapshot {
    pub documents: Vec<DocumentRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: Fingerprint,
    pub text: String,
    pub source: String,
    pub chunk_index: u32,
}

/// A document returned by [`Bm25Index::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub id: Fingerprint,
    pub text: String,
    pub source: String,
    pub chunk_index: u32,
    pub score: f64,
}

/// An inverted index over chunk text with Okapi BM25 scoring.
///
/// Ordinals are dense integers assigned at insertion and are never exposed
/// outside the index; callers only ever see fingerprints.
#[derive(Debug, Default)]
pub struct Bm25Index {
    documents: Vec<DocumentRecord>,
    doc_lengths: Vec<u32>,
    fingerprint_to_ordinal: HashMap<Fingerprint, usize>,
    postings: HashMap<String, Vec<(usize, u32)>>,
    total_length: u64,
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn unique_term_count(&self) -> usize {
        self.postings.len()
    }

    fn average_doc_length(&self) -> f64 {
        if self.documents.is_empty() {
            1.0
        } else {
            self.total_length as f64 / self.documents.len() as f64
        }
    }

    /// Tokenize `text`, assign a fresh ordinal, and append postings.
    pub fn add_document(&mut self, id: Fingerprint, text: &str, source: &str, chunk_index: u32) {
        let tokens = tokenize(text);
        let ordinal = self.documents.len();

        let mut term_freq: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *term_freq.entry(token.clone()).or_insert(0) += 1;
        }

        for (term, tf) in term_freq {
            self.postings.entry(term).or_default().push((ordinal, tf));
        }

        self.doc_lengths.push(tokens.len() as u32);
        self.total_length += tokens.len() as u64;
        self.fingerprint_to_ordinal.insert(id, ordinal);
        self.documents.push(DocumentRecord {
            id,
            text: text.to_string(),
            source: source.to_string(),
            chunk_index,
        });
    }

    fn idf(&self, df: usize) -> f64 {
        let n = self.documents.len() as f64;
        ((n - df as f64 + 0.5) / (df as f64 + 0.5) + 1.0).ln()
    }

    /// Score and rank documents against `query`, returning up to `top_k`
    /// results descending by score. Returns empty when the query
    /// tokenizes to nothing or the index is empty — never an error.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<ScoredDocument> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() || self.documents.is_empty() {
            return Vec::new();
        }

        let avgdl = self.average_doc_length();
        let mut scores: HashMap<usize, f64> = HashMap::new();

        // dedupe query tokens so repeated terms don't double-count idf improperly;
        // BM25 sums per unique query term over its postings.
        let mut seen = std::collections::HashSet::new();
        for token in &query_tokens {
            if !seen.insert(token.clone()) {
                continue;
            }
            let Some(postings) = self.postings.get(token) else {
                continue;
            };
            let idf = self.idf(postings.len());
            for &(ordinal, tf) in postings {
                let dl = self.doc_lengths[ordinal] as f64;
                let tf = tf as f64;
                let numerator = tf * (K1 + 1.0);
                let denominator = tf + K1 * (1.0 - B + B * dl / avgdl);
                *scores.entry(ordinal).or_insert(0.0) += idf * numerator / denominator;
            }
        }

        let mut ranked: Vec<(usize, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        ranked
            .into_iter()
            .take(top_k)
            .map(|(ordinal, score)| {
                let doc = &self.documents[ordinal];
                ScoredDocument {
                    id: doc.id,
                    text: doc.text.clone(),
                    source: doc.source.clone(),
                    chunk_index: doc.chunk_index,
                    score,
                }
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.documents.clear();
        self.doc_lengths.clear();
        self.fingerprint_to_ordinal.clear();
        self.postings.clear();
        self.total_length = 0;
    }

    pub fn snapshot(&self) -> Bm25Snapshot {
        Bm25Snapshot {
            documents: self.documents.clone(),
        }
    }

    /// Write the snapshot atomically: serialize to a temp file in the same
    /// directory, then rename over the destination.
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = self.snapshot();
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| BrainError::CorruptSnapshot(e.to_string()))?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Rebuild an index by replaying a snapshot's documents through
    /// `add_document`, in order.
    pub fn from_snapshot(snapshot: Bm25Snapshot) -> Self {
        let mut index = Self::new();
        for doc in snapshot.documents {
            index.add_document(doc.id, &doc.text, &doc.source, doc.chunk_index);
        }
        index
    }

    /// Load a snapshot from disk. Any I/O or parse failure is surfaced as
    /// [`BrainError::CorruptSnapshot`]; callers should treat that as "start
    /// empty" per the initialize-must-not-fail invariant.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let snapshot: Bm25Snapshot =
            serde_json::from_str(&contents).map_err(|e| BrainError::CorruptSnapshot(e.to_string()))?;
        Ok(Self::from_snapshot(snapshot))
    }
}
