//! Embedder capability
//!
//! The core requires only a narrow capability — encode text into a dense
//! vector — and a cosine-similarity helper over the result. Grounded in
//! the teacher's `Embedding`/`EmbeddingService` split (`embeddings/local.rs`):
//! we keep the same two-piece shape (a plain similarity function plus a
//! service trait) but drop the fastembed/ONNX specifics, since the actual
//! model is an external collaborator per the module overview.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use async_trait::async_trait;
use lru::LruCache;

/// A capability that turns text into a dense vector representation.
///
/// One concrete production implementation (a bundled ONNX encoder) is
/// expected to live outside this crate; `athenaeum-core` depends only on
/// this trait.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Encode `text`, or return `None` if the encoder declined (e.g. empty
    /// input) or failed — callers treat `None` as "no embedding available"
    /// rather than propagating an error, per the `ExternalFailure` policy.
    async fn encode(&self, text: &str) -> Option<Vec<f32>>;
}

/// Cosine similarity between two equal-length vectors, normalized to
/// `[-1.0, 1.0]` (callers clamp to `[0.0, 1.0]` where the spec calls for
/// it). Returns `0.0` when either magnitude is zero or lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// A deterministic, dependency-free stand-in for a real text encoder.
///
/// Hashes overlapping character trigrams into a fixed-width vector. Good
/// enough to exercise the retrieval pipeline end to end in tests and the
/// CLI demo; not a production embedding model.
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn encode(&self, text: &str) -> Option<Vec<f32>> {
        if text.trim().is_empty() {
            return None;
        }
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let bytes: Vec<u8> = lowered.bytes().collect();
        if bytes.len() < 3 {
            let bucket = bytes.iter().map(|b| *b as u64).sum::<u64>() as usize % self.dimensions;
            vector[bucket] += 1.0;
        } else {
            for window in bytes.windows(3) {
                let mut hash: u64 = 0xcbf29ce484222325;
                for b in window {
                    hash ^= *b as u64;
                    hash = hash.wrapping_mul(0x100000001b3);
                }
                vector[(hash as usize) % self.dimensions] += 1.0;
            }
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Some(vector)
    }
}

/// Wraps any [`Embedder`] with an LRU cache of recent query embeddings,
/// mirroring the teacher's `Storage::query_cache` (`storage/sqlite.rs`):
/// repeated recall/retrieval calls for the same query string skip
/// re-encoding.
pub struct CachedEmbedder<E: Embedder> {
    inner: E,
    cache: Mutex<LruCache<String, Option<Vec<f32>>>>,
}

impl<E: Embedder> CachedEmbedder<E> {
    pub fn new(inner: E, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(100).unwrap());
        Self { inner, cache: Mutex::new(LruCache::new(capacity)) }
    }
}

#[async_trait]
impl<E: Embedder> Embedder for CachedEmbedder<E> {
    async fn encode(&self, text: &str) -> Option<Vec<f32>> {
        if let Some(hit) = self.cache.lock().unwrap().get(text) {
            return hit.clone();
        }
        let result = self.inner.encode(text).await;
        self.cache.lock().unwrap().put(text.to_string(), result.clone());
        result
    }
}
