//! Seams to the external collaborators: embedding provider, vector store,
//! chunk store, and the optional reranker. All are object-safe so the engine
//! can be wired with `Arc<dyn _>` at startup.

use async_trait::async_trait;

use crate::types::{Chunk, DocumentFilters, RetrievalResult, ScoredPoint};

/// Produces fixed-dimension embeddings for text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dim(&self) -> usize;
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Nearest-neighbor search over stored chunk vectors. Implementations
/// translate [`DocumentFilters`] into their native filter representation.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filters: &DocumentFilters,
    ) -> anyhow::Result<Vec<ScoredPoint>>;
}

/// Full-scan access to every indexed chunk, used to (re)build the keyword
/// index.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn scan_chunks(&self) -> anyhow::Result<Vec<Chunk>>;
}

/// Optional cross-encoder style rerank step applied after diversification.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        results: Vec<RetrievalResult>,
    ) -> anyhow::Result<Vec<RetrievalResult>>;
}
