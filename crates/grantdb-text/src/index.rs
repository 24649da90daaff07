//! BM25-Okapi scoring over parallel corpus arrays.
//!
//! Snapshot lifecycle: UNBUILT -> BUILDING -> READY, and READY -> BUILDING ->
//! READY on rebuild. Fixed policy: queries issued while a rebuild is running
//! are served by the previous READY snapshot; only the very first query
//! blocks on the initial build.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Context, Result};
use tokio::sync::Mutex;
use tracing::{debug, info};

use grantdb_core::query::tokenize;
use grantdb_core::traits::ChunkStore;
use grantdb_core::types::{Chunk, DocumentFilters, RetrievalResult};

const BM25_K1: f32 = 1.5;
const BM25_B: f32 = 0.75;

/// One immutable build of the index.
///
/// `chunks` and `tokenized` are parallel: the same position refers to the
/// same chunk in both. Tokenization uses the same `tokenize` as the query
/// path.
struct Snapshot {
    chunks: Vec<Chunk>,
    tokenized: Vec<Vec<String>>,
    doc_freq: HashMap<String, usize>,
    avg_len: f32,
    generation: u64,
}

impl Snapshot {
    fn build(chunks: Vec<Chunk>, generation: u64) -> Self {
        let tokenized: Vec<Vec<String>> = chunks.iter().map(|c| tokenize(&c.text)).collect();
        debug_assert_eq!(chunks.len(), tokenized.len());

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut total_len = 0usize;
        for tokens in &tokenized {
            total_len += tokens.len();
            let unique: HashSet<&String> = tokens.iter().collect();
            for term in unique {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
        }
        let avg_len = if tokenized.is_empty() {
            0.0
        } else {
            total_len as f32 / tokenized.len() as f32
        };

        Self {
            chunks,
            tokenized,
            doc_freq,
            avg_len,
            generation,
        }
    }

    /// BM25-Okapi score of one corpus entry against the query terms.
    fn score(&self, idx: usize, query_terms: &[String]) -> f32 {
        let tokens = &self.tokenized[idx];
        if tokens.is_empty() || self.avg_len == 0.0 {
            return 0.0;
        }
        let mut term_freq: HashMap<&str, f32> = HashMap::new();
        for token in tokens {
            *term_freq.entry(token.as_str()).or_insert(0.0) += 1.0;
        }

        let corpus_size = self.chunks.len() as f32;
        let len_norm = BM25_K1 * (1.0 - BM25_B + BM25_B * tokens.len() as f32 / self.avg_len);
        let mut score = 0.0;
        for term in query_terms {
            let Some(&tf) = term_freq.get(term.as_str()) else {
                continue;
            };
            let df = self.doc_freq.get(term).copied().unwrap_or(0) as f32;
            let idf = ((corpus_size - df + 0.5) / (df + 0.5) + 1.0).ln();
            score += idf * (tf * (BM25_K1 + 1.0)) / (tf + len_norm);
        }
        score
    }
}

/// Lexical index over all corpus chunks.
///
/// The snapshot pointer is replaced, never mutated in place. Rebuilds are
/// single-flighted: a rebuild request that waited out another build observes
/// the bumped generation and coalesces instead of scanning again.
pub struct KeywordIndex {
    store: Arc<dyn ChunkStore>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    /// Guards builds; the guarded value is the generation counter.
    build_lock: Mutex<u64>,
}

impl KeywordIndex {
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        Self {
            store,
            snapshot: RwLock::new(None),
            build_lock: Mutex::new(0),
        }
    }

    fn current(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().ok().and_then(|guard| guard.clone())
    }

    /// Number of chunks in the current snapshot, if one exists.
    pub fn chunk_count(&self) -> Option<usize> {
        self.current().map(|snapshot| snapshot.chunks.len())
    }

    /// Scans the chunk store and swaps in a fresh snapshot.
    pub async fn rebuild(&self) -> Result<()> {
        let observed = self.current().map_or(0, |s| s.generation);
        let mut generation = self.build_lock.lock().await;
        if *generation > observed {
            debug!(generation = *generation, "coalescing into a finished rebuild");
            return Ok(());
        }
        self.build_locked(&mut generation).await?;
        Ok(())
    }

    async fn build_locked(&self, generation: &mut u64) -> Result<Arc<Snapshot>> {
        let chunks = self
            .store
            .scan_chunks()
            .await
            .context("chunk store scan for keyword index build failed")?;
        *generation += 1;
        let snapshot = Arc::new(Snapshot::build(chunks, *generation));
        info!(
            chunks = snapshot.chunks.len(),
            terms = snapshot.doc_freq.len(),
            generation = *generation,
            "keyword index built"
        );
        let mut guard = self
            .snapshot
            .write()
            .map_err(|_| anyhow!("keyword index snapshot lock poisoned"))?;
        *guard = Some(snapshot.clone());
        Ok(snapshot)
    }

    async fn ensure_built(&self) -> Result<Arc<Snapshot>> {
        if let Some(snapshot) = self.current() {
            return Ok(snapshot);
        }
        let mut generation = self.build_lock.lock().await;
        // Another task may have finished the initial build while we waited.
        if let Some(snapshot) = self.current() {
            return Ok(snapshot);
        }
        self.build_locked(&mut generation).await
    }

    /// Scores the corpus against `query_text`, keeps entries with score > 0,
    /// sorts by score descending (ties: ascending corpus index), applies
    /// `filters`, and truncates to `top_k`.
    ///
    /// Builds the index first if it has never been built.
    pub async fn query(
        &self,
        query_text: &str,
        top_k: usize,
        filters: &DocumentFilters,
    ) -> Result<Vec<RetrievalResult>> {
        let snapshot = self.ensure_built().await?;
        let terms = tokenize(query_text);
        if terms.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = (0..snapshot.chunks.len())
            .filter_map(|idx| {
                let score = snapshot.score(idx, &terms);
                (score > 0.0).then_some((idx, score))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut results = Vec::with_capacity(top_k.min(scored.len()));
        for (idx, score) in scored {
            let chunk = &snapshot.chunks[idx];
            if !filters.matches(&chunk.metadata, &chunk.doc_id) {
                continue;
            }
            results.push(RetrievalResult::from_chunk(chunk, score));
            if results.len() == top_k {
                break;
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantdb_core::types::ChunkMetadata;

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            text: text.to_string(),
            doc_id: format!("doc-{id}"),
            chunk_index: 0,
            metadata: ChunkMetadata::default(),
        }
    }

    #[test]
    fn snapshot_arrays_stay_parallel() {
        let snapshot = Snapshot::build(
            vec![
                chunk("a", "after school tutoring"),
                chunk("b", "community garden budget"),
                chunk("c", ""),
            ],
            1,
        );
        assert_eq!(snapshot.chunks.len(), snapshot.tokenized.len());
        assert_eq!(snapshot.tokenized[0], vec!["after", "school", "tutoring"]);
        assert!(snapshot.tokenized[2].is_empty());
    }

    #[test]
    fn repeated_terms_score_higher() {
        let snapshot = Snapshot::build(
            vec![
                chunk("a", "tutoring once here"),
                chunk("b", "tutoring tutoring tutoring weekly"),
            ],
            1,
        );
        let terms = tokenize("tutoring");
        assert!(snapshot.score(1, &terms) > snapshot.score(0, &terms));
    }

    #[test]
    fn unmatched_entry_scores_zero() {
        let snapshot = Snapshot::build(vec![chunk("a", "housing policy brief")], 1);
        assert_eq!(snapshot.score(0, &tokenize("volcano")), 0.0);
    }

    #[test]
    fn rare_terms_outweigh_common_ones() {
        // "grant" appears everywhere, "stipend" once.
        let snapshot = Snapshot::build(
            vec![
                chunk("a", "grant report"),
                chunk("b", "grant budget"),
                chunk("c", "grant stipend"),
            ],
            1,
        );
        let grant = snapshot.score(0, &tokenize("grant"));
        let stipend = snapshot.score(2, &tokenize("stipend"));
        assert!(stipend > grant);
    }
}
