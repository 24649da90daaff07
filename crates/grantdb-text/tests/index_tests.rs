use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use grantdb_core::traits::ChunkStore;
use grantdb_core::types::{Chunk, ChunkMetadata, DocumentFilters};
use grantdb_text::KeywordIndex;

struct MemStore {
    chunks: Mutex<Vec<Chunk>>,
    scans: AtomicUsize,
}

impl MemStore {
    fn new(chunks: Vec<Chunk>) -> Arc<Self> {
        Arc::new(Self {
            chunks: Mutex::new(chunks),
            scans: AtomicUsize::new(0),
        })
    }

    fn replace(&self, chunks: Vec<Chunk>) {
        *self.chunks.lock().unwrap() = chunks;
    }
}

#[async_trait]
impl ChunkStore for MemStore {
    async fn scan_chunks(&self) -> anyhow::Result<Vec<Chunk>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        Ok(self.chunks.lock().unwrap().clone())
    }
}

/// Scan that takes long enough for callers to pile up behind the build lock.
struct SlowStore {
    inner: Arc<MemStore>,
}

#[async_trait]
impl ChunkStore for SlowStore {
    async fn scan_chunks(&self) -> anyhow::Result<Vec<Chunk>> {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        self.inner.scan_chunks().await
    }
}

struct FailingStore;

#[async_trait]
impl ChunkStore for FailingStore {
    async fn scan_chunks(&self) -> anyhow::Result<Vec<Chunk>> {
        Err(anyhow::anyhow!("store offline"))
    }
}

fn chunk(id: &str, doc_id: &str, text: &str, year: Option<i32>, doc_type: &str) -> Chunk {
    Chunk {
        chunk_id: id.to_string(),
        text: text.to_string(),
        doc_id: doc_id.to_string(),
        chunk_index: 0,
        metadata: ChunkMetadata {
            doc_type: Some(doc_type.to_string()),
            year,
            ..Default::default()
        },
    }
}

fn corpus() -> Vec<Chunk> {
    vec![
        chunk(
            "c1",
            "doc-1",
            "after school tutoring program for middle school students",
            Some(2022),
            "proposal",
        ),
        chunk(
            "c2",
            "doc-2",
            "tutoring outcomes improved reading scores across the cohort",
            Some(2024),
            "report",
        ),
        chunk(
            "c3",
            "doc-3",
            "annual budget for the community garden initiative",
            Some(2023),
            "budget",
        ),
    ]
}

#[tokio::test]
async fn first_query_builds_lazily() {
    let store = MemStore::new(corpus());
    let index = KeywordIndex::new(store.clone());
    assert_eq!(index.chunk_count(), None);

    let results = index
        .query("tutoring", 10, &DocumentFilters::default())
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(index.chunk_count(), Some(3));
    assert_eq!(store.scans.load(Ordering::SeqCst), 1);

    // A second query reuses the snapshot.
    index
        .query("budget", 10, &DocumentFilters::default())
        .await
        .unwrap();
    assert_eq!(store.scans.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn only_matching_entries_are_returned() {
    let index = KeywordIndex::new(MemStore::new(corpus()));
    let results = index
        .query("garden budget", 10, &DocumentFilters::default())
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_id, "c3");
    assert!(results[0].score > 0.0);
}

#[tokio::test]
async fn equal_scores_break_ties_by_corpus_index() {
    let chunks = vec![
        chunk("first", "doc-a", "identical wording", None, "note"),
        chunk("second", "doc-b", "identical wording", None, "note"),
    ];
    let index = KeywordIndex::new(MemStore::new(chunks));
    let results = index
        .query("identical wording", 10, &DocumentFilters::default())
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].chunk_id, "first");
    assert_eq!(results[1].chunk_id, "second");
}

#[tokio::test]
async fn filters_drop_non_matching_entries() {
    let index = KeywordIndex::new(MemStore::new(corpus()));
    let filters = DocumentFilters {
        doc_types: Some(BTreeSet::from(["report".to_string()])),
        ..Default::default()
    };
    let results = index.query("tutoring", 10, &filters).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_id, "c2");

    let excluded = DocumentFilters {
        exclude_docs: Some(BTreeSet::from(["doc-2".to_string()])),
        ..Default::default()
    };
    let results = index.query("tutoring", 10, &excluded).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_id, "c1");
}

#[tokio::test]
async fn top_k_truncates_after_filtering() {
    let index = KeywordIndex::new(MemStore::new(corpus()));
    let results = index
        .query("tutoring", 1, &DocumentFilters::default())
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn empty_query_returns_empty() {
    let index = KeywordIndex::new(MemStore::new(corpus()));
    let results = index
        .query("!!! ...", 10, &DocumentFilters::default())
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn rebuild_swaps_in_new_corpus() {
    let store = MemStore::new(corpus());
    let index = KeywordIndex::new(store.clone());
    index.rebuild().await.unwrap();
    assert_eq!(index.chunk_count(), Some(3));

    store.replace(vec![chunk(
        "c9",
        "doc-9",
        "new literacy curriculum chunk",
        Some(2025),
        "proposal",
    )]);
    index.rebuild().await.unwrap();
    assert_eq!(index.chunk_count(), Some(1));

    let stale = index
        .query("tutoring", 10, &DocumentFilters::default())
        .await
        .unwrap();
    assert!(stale.is_empty());
    let fresh = index
        .query("literacy", 10, &DocumentFilters::default())
        .await
        .unwrap();
    assert_eq!(fresh.len(), 1);
}

#[tokio::test]
async fn concurrent_rebuilds_coalesce() {
    let store = MemStore::new(corpus());
    let index = Arc::new(KeywordIndex::new(Arc::new(SlowStore {
        inner: store.clone(),
    })));
    index.rebuild().await.unwrap();
    let scans_after_first = store.scans.load(Ordering::SeqCst);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let index = index.clone();
        handles.push(tokio::spawn(async move { index.rebuild().await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    // The racing requests queue behind one in-flight build and coalesce.
    assert_eq!(store.scans.load(Ordering::SeqCst), scans_after_first + 1);
}

#[tokio::test]
async fn failed_scan_surfaces_as_error() {
    let index = KeywordIndex::new(Arc::new(FailingStore));
    let err = index
        .query("anything", 5, &DocumentFilters::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("keyword index build"));
}
