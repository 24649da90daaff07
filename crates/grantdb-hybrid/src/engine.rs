//! Orchestration of the full retrieval pipeline:
//! process -> fan out (vector || keyword) -> fuse -> recency -> diversify ->
//! rerank -> truncate.
//!
//! One engine is constructed at startup and shared by reference; there is no
//! process-wide singleton. A failed sub-search degrades to an empty list and
//! a warning; only both paths failing is an error for the caller.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::join;
use tracing::{instrument, warn};

use grantdb_core::config::RetrievalConfig;
use grantdb_core::error::{Result, RetrievalError};
use grantdb_core::query::QueryProcessor;
use grantdb_core::traits::Reranker;
use grantdb_core::types::{ChunkId, DocumentFilters, RetrievalResult, SearchPath};
use grantdb_text::KeywordIndex;
use grantdb_vector::VectorSearchClient;

use crate::diversify::diversify;
use crate::fuse::fuse;
use crate::recency::apply_recency;

pub struct RetrievalEngine {
    config: RetrievalConfig,
    processor: QueryProcessor,
    keyword: Arc<KeywordIndex>,
    vector: VectorSearchClient,
    reranker: Option<Arc<dyn Reranker>>,
}

impl RetrievalEngine {
    pub fn new(
        config: RetrievalConfig,
        keyword: Arc<KeywordIndex>,
        vector: VectorSearchClient,
    ) -> Result<Self> {
        config.validate()?;
        let processor = QueryProcessor::new(config.expand_query);
        Ok(Self {
            config,
            processor,
            keyword,
            vector,
            reranker: None,
        })
    }

    /// Wires in the external cross-encoder; only used when
    /// `enable_reranking` is set.
    #[must_use]
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Runs the hybrid pipeline for one query.
    ///
    /// `recency_weight` overrides the configured default for this call only.
    #[instrument(skip(self, filters))]
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filters: &DocumentFilters,
        recency_weight: Option<f32>,
    ) -> Result<Vec<RetrievalResult>> {
        filters.validate()?;
        let recency_weight = recency_weight.unwrap_or(self.config.default_recency_weight);
        if !(0.0..=1.0).contains(&recency_weight) || !recency_weight.is_finite() {
            return Err(RetrievalError::InvalidConfig(format!(
                "recency_weight must be in [0, 1], got {recency_weight}"
            )));
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let processed = self.processor.process(query);
        // Over-fetch so fusion and diversification have candidates to drop.
        let fetch = top_k.saturating_mul(self.config.candidate_multiplier);

        let (vector_res, keyword_res) = join!(
            self.vector.search(&processed, fetch, filters),
            self.keyword.query(&processed, fetch, filters),
        );

        if let (Err(vector_err), Err(keyword_err)) = (&vector_res, &keyword_res) {
            warn!(
                query = %processed,
                filters = ?filters,
                vector_error = %vector_err,
                keyword_error = %keyword_err,
                "both retrieval paths failed"
            );
            return Err(RetrievalError::SearchUnavailable {
                vector: vector_err.to_string(),
                keyword: keyword_err.to_string(),
            });
        }
        let vector_results = vector_res.unwrap_or_else(|e| {
            warn!(
                path = %SearchPath::Vector,
                query = %processed,
                filters = ?filters,
                error = format!("{e:#}"),
                "search path failed; serving degraded results"
            );
            Vec::new()
        });
        let keyword_results = keyword_res.unwrap_or_else(|e| {
            warn!(
                path = %SearchPath::Keyword,
                query = %processed,
                filters = ?filters,
                error = format!("{e:#}"),
                "search path failed; serving degraded results"
            );
            Vec::new()
        });

        // Chunks seen by both paths keep their tie-break advantage through
        // the recency re-sort.
        let in_both: HashSet<ChunkId> = {
            let keyword_ids: HashSet<&str> =
                keyword_results.iter().map(|r| r.chunk_id.as_str()).collect();
            vector_results
                .iter()
                .filter(|r| keyword_ids.contains(r.chunk_id.as_str()))
                .map(|r| r.chunk_id.clone())
                .collect()
        };

        let merged = fuse(
            vector_results,
            keyword_results,
            self.config.vector_weight,
            self.config.keyword_weight,
        );
        let weighted = apply_recency(merged, recency_weight, &in_both);
        let mut diversified = diversify(weighted, self.config.max_per_doc);

        if self.config.enable_reranking {
            if let Some(reranker) = &self.reranker {
                match reranker.rerank(&processed, diversified.clone()).await {
                    Ok(reranked) => diversified = reranked,
                    Err(e) => {
                        warn!(error = format!("{e:#}"), "rerank failed; keeping fused order");
                    }
                }
            }
        }

        diversified.truncate(top_k);
        Ok(diversified)
    }
}
