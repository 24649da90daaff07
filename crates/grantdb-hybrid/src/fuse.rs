//! Hybrid score fusion.
//!
//! BM25 scores and cosine similarities live on unrelated scales, so each
//! list is min-max normalized to [0, 1] before the weighted combine. The
//! whole step is pure and deterministic.

use std::collections::HashMap;

use grantdb_core::types::{ChunkId, RetrievalResult};

/// Min-max normalization of one result list. A list whose scores are all
/// equal maps to 1.0 everywhere: it avoids the divide by zero and keeps a
/// uniformly confident list from being erased.
fn normalize(results: &[RetrievalResult]) -> HashMap<ChunkId, f32> {
    if results.is_empty() {
        return HashMap::new();
    }
    let min = results.iter().map(|r| r.score).fold(f32::INFINITY, f32::min);
    let max = results
        .iter()
        .map(|r| r.score)
        .fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    results
        .iter()
        .map(|r| {
            let norm = if range == 0.0 {
                1.0
            } else {
                (r.score - min) / range
            };
            (r.chunk_id.clone(), norm)
        })
        .collect()
}

/// Fuses the two ranked lists into one deduplicated ranking.
///
/// `combined = vector_weight * norm_vector + keyword_weight * norm_keyword`,
/// with 0 contributed by a list the chunk is absent from. Ties break by
/// presence in both lists, then by ascending chunk id. When a chunk appears
/// in both lists the vector payload wins (the richer semantic match).
pub fn fuse(
    vector_results: Vec<RetrievalResult>,
    keyword_results: Vec<RetrievalResult>,
    vector_weight: f32,
    keyword_weight: f32,
) -> Vec<RetrievalResult> {
    let vector_norm = normalize(&vector_results);
    let keyword_norm = normalize(&keyword_results);

    let mut payloads: HashMap<ChunkId, RetrievalResult> = HashMap::new();
    for result in keyword_results {
        payloads.insert(result.chunk_id.clone(), result);
    }
    for result in vector_results {
        payloads.insert(result.chunk_id.clone(), result);
    }

    let mut fused: Vec<RetrievalResult> = payloads
        .into_values()
        .map(|mut result| {
            let v = vector_norm.get(&result.chunk_id).copied().unwrap_or(0.0);
            let k = keyword_norm.get(&result.chunk_id).copied().unwrap_or(0.0);
            result.score = vector_weight * v + keyword_weight * k;
            result
        })
        .collect();

    let in_both =
        |id: &ChunkId| vector_norm.contains_key(id) && keyword_norm.contains_key(id);
    fused.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| in_both(&b.chunk_id).cmp(&in_both(&a.chunk_id)))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    fused
}
