//! Deterministic hashing-based embedding, for tests and offline demos.

use super::{EmbeddingRole, EmbeddingService};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const DIMENSIONS: usize = 32;

/// A bag-of-words hashing embedding: every lowercased token is hashed into
/// one of [`DIMENSIONS`] buckets and accumulated, then the vector is
/// L2-normalized. Not semantically meaningful, but deterministic and stable
/// under near-duplicate phrasing, which is what the dedup and convergence
/// tests need from a stand-in embedding service.
#[derive(Debug, Default)]
pub struct HashEmbedding;

impl HashEmbedding {
    /// Construct the embedder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn vectorize(text: &str) -> Vec<f32> {
        let mut buckets = vec![0.0_f32; DIMENSIONS];
        for token in text.split_whitespace() {
            let token = token.to_lowercase();
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() % DIMENSIONS as u64) as usize;
            buckets[bucket] += 1.0;
        }
        let norm: f32 = buckets.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut buckets {
                *v /= norm;
            }
        }
        buckets
    }
}

#[async_trait]
impl EmbeddingService for HashEmbedding {
    async fn embed(&self, text: &str, _role: EmbeddingRole) -> Result<Vec<f32>> {
        Ok(Self::vectorize(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_text_yields_identical_vector() {
        let emb = HashEmbedding::new();
        let a = emb.embed("we should expand to the EU", EmbeddingRole::Document).await.unwrap();
        let b = emb.embed("we should expand to the EU", EmbeddingRole::Document).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_text_yields_different_vector() {
        let emb = HashEmbedding::new();
        let a = emb.embed("expand to the EU market", EmbeddingRole::Document).await.unwrap();
        let b = emb.embed("stay focused on domestic growth", EmbeddingRole::Document).await.unwrap();
        assert_ne!(a, b);
    }
}
