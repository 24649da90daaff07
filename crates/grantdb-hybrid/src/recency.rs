//! Recency re-weighting.
//!
//! The recency factor is scaled within the candidate set's own year range,
//! and it multiplies the combined score: recency can attenuate, never
//! invert, the ranking among equally scored items. A weight of 0 leaves
//! scores untouched. The re-sort breaks ties the same way fusion does:
//! presence in both retrieval paths, then ascending chunk id.

use std::collections::HashSet;

use grantdb_core::types::{ChunkId, RetrievalResult};

pub fn apply_recency(
    mut results: Vec<RetrievalResult>,
    recency_weight: f32,
    in_both: &HashSet<ChunkId>,
) -> Vec<RetrievalResult> {
    if recency_weight == 0.0 || results.is_empty() {
        return results;
    }

    let min_year = results.iter().filter_map(|r| r.metadata.year).min();
    let max_year = results.iter().filter_map(|r| r.metadata.year).max();

    for result in &mut results {
        let factor = match (result.metadata.year, min_year, max_year) {
            (Some(year), Some(min), Some(max)) => {
                if min == max {
                    1.0
                } else {
                    (year - min) as f32 / (max - min) as f32
                }
            }
            // Entries without a year get no recency boost.
            _ => 0.0,
        };
        result.score *= (1.0 - recency_weight) + recency_weight * factor;
    }

    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| in_both.contains(&b.chunk_id).cmp(&in_both.contains(&a.chunk_id)))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    results
}
