//! Embedding service (spec §4.3): semantic vectors for contributions, used
//! for dedup, convergence, and novelty scoring.

pub mod hash;

pub use hash::HashEmbedding;

use crate::error::Result;
use async_trait::async_trait;

/// Which role the embedded text plays, mirrored from the asymmetric
/// document/query embedding APIs the broker-adjacent providers expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingRole {
    /// Text being stored/compared against (a contribution).
    Document,
    /// Text used to search/compare (a problem statement, a query).
    Query,
}

/// Produces semantic vectors for text. Failures are non-fatal to callers
/// (spec §4.3): semantic dedup degrades to "no filtering" and logs a
/// warning rather than aborting deliberation.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed `text` for the given role.
    async fn embed(&self, text: &str, role: EmbeddingRole) -> Result<Vec<f32>>;
}

/// Cosine similarity between two equal-length vectors. Returns `0.0` for a
/// zero vector or length mismatch rather than panicking, since embedding
/// failures must degrade gracefully rather than abort a round.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Highest similarity (and its index) of `candidate` against every vector
/// in `others`. Returns `(0.0, None)` for an empty `others`.
#[must_use]
pub fn max_similarity(candidate: &[f32], others: &[Vec<f32>]) -> (f32, Option<usize>) {
    let mut best = (0.0_f32, None);
    for (i, other) in others.iter().enumerate() {
        let sim = cosine_similarity(candidate, other);
        if sim > best.0 {
            best = (sim, Some(i));
        }
    }
    best
}
