//! grantdb-embed
//!
//! Embedding providers. The real deployment talks to an external embedding
//! service; this crate ships a deterministic token-hash embedder for offline
//! development, ingestion dry runs, and tests. Hash embeddings are stable
//! across processes, so an index built offline stays queryable offline.

use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use grantdb_core::traits::EmbeddingProvider;

pub const DEFAULT_HASH_DIM: usize = 256;

/// Deterministic bag-of-tokens embedder.
///
/// Each whitespace token is hashed into one of `dim` buckets and the vector
/// is L2-normalized. Not semantically meaningful, but stable, cheap, and good
/// enough to exercise the full retrieval pipeline end to end.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIM)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedding_has_configured_dim() {
        let embedder = HashEmbedder::new(64);
        let v = embedder.embed("after school literacy program").await.unwrap();
        assert_eq!(v.len(), 64);
        assert_eq!(embedder.dim(), 64);
    }

    #[tokio::test]
    async fn embedding_is_deterministic() {
        let embedder = HashEmbedder::default();
        let a = embedder.embed("youth mentoring outcomes").await.unwrap();
        let b = embedder.embed("youth mentoring outcomes").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn embedding_is_normalized() {
        let embedder = HashEmbedder::default();
        let v = embedder.embed("community health proposal draft").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4, "norm was {norm}");
    }

    #[tokio::test]
    async fn different_texts_differ() {
        let embedder = HashEmbedder::default();
        let a = embedder.embed("housing stability grant").await.unwrap();
        let b = embedder.embed("food security pilot").await.unwrap();
        assert_ne!(a, b);
    }
}
