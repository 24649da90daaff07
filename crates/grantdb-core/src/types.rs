//! Domain types shared by the keyword and vector retrieval paths.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{Result, RetrievalError};

pub type ChunkId = String;

/// Structured metadata attached to every chunk at ingestion time.
///
/// The field set is fixed; each field is optional. Metadata is validated once
/// at the store boundary, never re-parsed on the query path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub programs: BTreeSet<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// A bounded span of text from a source document, the unit of retrieval.
///
/// Chunks are immutable: re-ingesting a document replaces its chunks
/// wholesale, deleting a document removes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub text: String,
    pub doc_id: String,
    pub chunk_index: usize,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

/// A ranked hit produced for a single query. Request lifetime only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: ChunkId,
    pub text: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
    pub doc_id: String,
    pub chunk_index: usize,
}

impl RetrievalResult {
    /// Builds a result from an indexed chunk and an engine-specific score.
    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            text: chunk.text.clone(),
            score,
            metadata: chunk.metadata.clone(),
            doc_id: chunk.doc_id.clone(),
            chunk_index: chunk.chunk_index,
        }
    }
}

/// Payload stored next to each vector in the vector store.
///
/// `text` is split out into the result; the remaining fields travel as
/// metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub text: String,
    pub doc_id: String,
    pub chunk_index: usize,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

/// Raw nearest-neighbor hit as returned by a vector store.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: ChunkId,
    pub score: f32,
    pub payload: ChunkPayload,
}

impl From<ScoredPoint> for RetrievalResult {
    fn from(point: ScoredPoint) -> Self {
        Self {
            chunk_id: point.id,
            text: point.payload.text,
            score: point.score,
            metadata: point.payload.metadata,
            doc_id: point.payload.doc_id,
            chunk_index: point.payload.chunk_index,
        }
    }
}

/// Labels the two retrieval paths, mostly for log context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchPath {
    Vector,
    Keyword,
}

impl std::fmt::Display for SearchPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchPath::Vector => write!(f, "vector"),
            SearchPath::Keyword => write!(f, "keyword"),
        }
    }
}

/// Structured metadata filters applied to both retrieval paths.
///
/// Conditions are conjunctive across categories and disjunctive within one:
/// `doc_types = [A, B]` matches A or B, but every populated category must
/// hold for a chunk to pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFilters {
    #[serde(default)]
    pub doc_types: Option<BTreeSet<String>>,
    #[serde(default)]
    pub years: Option<BTreeSet<i32>>,
    #[serde(default)]
    pub programs: Option<BTreeSet<String>>,
    #[serde(default)]
    pub outcomes: Option<BTreeSet<String>>,
    /// Inclusive `(start, end)` year range.
    #[serde(default)]
    pub date_range: Option<(i32, i32)>,
    #[serde(default)]
    pub exclude_docs: Option<BTreeSet<String>>,
}

impl DocumentFilters {
    /// Rejects malformed filters before any search executes.
    pub fn validate(&self) -> Result<()> {
        if let Some((start, end)) = self.date_range {
            if start > end {
                return Err(RetrievalError::InvalidFilters(format!(
                    "date_range start {start} is after end {end}"
                )));
            }
        }
        Ok(())
    }

    /// True when no category is populated.
    pub fn is_empty(&self) -> bool {
        self.doc_types.is_none()
            && self.years.is_none()
            && self.programs.is_none()
            && self.outcomes.is_none()
            && self.date_range.is_none()
            && self.exclude_docs.is_none()
    }

    /// The shared filter predicate. Both retrieval paths must agree on this;
    /// the vector store additionally pushes an equivalent predicate down.
    pub fn matches(&self, metadata: &ChunkMetadata, doc_id: &str) -> bool {
        if let Some(doc_types) = &self.doc_types {
            match &metadata.doc_type {
                Some(doc_type) if doc_types.contains(doc_type) => {}
                _ => return false,
            }
        }
        if let Some(years) = &self.years {
            match metadata.year {
                Some(year) if years.contains(&year) => {}
                _ => return false,
            }
        }
        if let Some((start, end)) = self.date_range {
            match metadata.year {
                Some(year) if year >= start && year <= end => {}
                _ => return false,
            }
        }
        if let Some(programs) = &self.programs {
            if metadata.programs.is_disjoint(programs) {
                return false;
            }
        }
        if let Some(outcomes) = &self.outcomes {
            match &metadata.outcome {
                Some(outcome) if outcomes.contains(outcome) => {}
                _ => return false,
            }
        }
        if let Some(excluded) = &self.exclude_docs {
            if excluded.contains(doc_id) {
                return false;
            }
        }
        true
    }
}
