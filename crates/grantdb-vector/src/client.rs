//! Thin adapter between the engine and the vector store: embeds the
//! processed query, requests nearest neighbors, and maps raw points into
//! retrieval results.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;

use grantdb_core::traits::{EmbeddingProvider, VectorStore};
use grantdb_core::types::{DocumentFilters, RetrievalResult};

pub struct VectorSearchClient {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl VectorSearchClient {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    pub async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        filters: &DocumentFilters,
    ) -> Result<Vec<RetrievalResult>> {
        let vector = self
            .embedder
            .embed(query_text)
            .await
            .context("query embedding failed")?;
        let points = self
            .store
            .search(&vector, top_k, filters)
            .await
            .context("vector store search failed")?;
        debug!(hits = points.len(), top_k, "vector search completed");
        Ok(points.into_iter().map(RetrievalResult::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use grantdb_core::types::{ChunkMetadata, ChunkPayload, ScoredPoint};

    struct UnitEmbedder;

    #[async_trait]
    impl EmbeddingProvider for UnitEmbedder {
        fn dim(&self) -> usize {
            4
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0, 0.0, 0.0])
        }
    }

    struct FixedStore {
        points: Vec<ScoredPoint>,
    }

    #[async_trait]
    impl VectorStore for FixedStore {
        async fn search(
            &self,
            vector: &[f32],
            _top_k: usize,
            _filters: &DocumentFilters,
        ) -> Result<Vec<ScoredPoint>> {
            assert_eq!(vector.len(), 4);
            Ok(self.points.clone())
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl EmbeddingProvider for BrokenEmbedder {
        fn dim(&self) -> usize {
            4
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(anyhow::anyhow!("provider down"))
        }
    }

    fn point(id: &str, score: f32) -> ScoredPoint {
        ScoredPoint {
            id: id.to_string(),
            score,
            payload: ChunkPayload {
                text: format!("text of {id}"),
                doc_id: "doc-1".to_string(),
                chunk_index: 0,
                metadata: ChunkMetadata::default(),
            },
        }
    }

    #[tokio::test]
    async fn points_map_to_results() {
        let client = VectorSearchClient::new(
            Arc::new(UnitEmbedder),
            Arc::new(FixedStore {
                points: vec![point("c1", 0.9), point("c2", 0.4)],
            }),
        );
        let results = client
            .search("literacy outcomes", 5, &DocumentFilters::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, "c1");
        assert_eq!(results[0].text, "text of c1");
        assert!((results[0].score - 0.9).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn embedding_failure_propagates() {
        let client = VectorSearchClient::new(
            Arc::new(BrokenEmbedder),
            Arc::new(FixedStore { points: vec![] }),
        );
        let err = client
            .search("anything", 5, &DocumentFilters::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("query embedding failed"));
    }
}
