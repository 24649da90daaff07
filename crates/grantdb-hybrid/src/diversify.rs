//! Per-document diversification.
//!
//! Walks the ranked list once, keeping at most `max_per_doc` chunks per
//! source document. Dropped entries are gone for good; lower-ranked chunks
//! are not promoted into the freed slots.

use std::collections::HashMap;

use grantdb_core::types::RetrievalResult;

pub fn diversify(results: Vec<RetrievalResult>, max_per_doc: usize) -> Vec<RetrievalResult> {
    let mut per_doc: HashMap<String, usize> = HashMap::new();
    results
        .into_iter()
        .filter(|result| {
            let count = per_doc.entry(result.doc_id.clone()).or_insert(0);
            if *count < max_per_doc {
                *count += 1;
                true
            } else {
                false
            }
        })
        .collect()
}
