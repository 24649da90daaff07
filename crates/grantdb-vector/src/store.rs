//! LanceDB chunk store.
//!
//! One table holds every chunk: text, flattened metadata columns, and the
//! embedding vector. Upserts go through `merge_insert` keyed on `id`, so
//! re-ingesting a document replaces its chunks wholesale.

use anyhow::{anyhow, ensure, Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};

use grantdb_core::traits::{ChunkStore, VectorStore};
use grantdb_core::types::{Chunk, ChunkMetadata, ChunkPayload, DocumentFilters, ScoredPoint};

use crate::filter::filter_predicate;
use crate::schema::{build_chunk_schema, decode_programs, encode_programs};

pub struct LanceChunkStore {
    db: Connection,
    table_name: String,
    dim: i32,
}

impl LanceChunkStore {
    pub async fn open(uri: &str, table_name: &str, dim: usize) -> Result<Self> {
        let db = connect(uri).execute().await?;
        Ok(Self {
            db,
            table_name: table_name.to_string(),
            dim: i32::try_from(dim).context("embedding dim out of range")?,
        })
    }

    async fn table_exists(&self) -> Result<bool> {
        let names = self.db.table_names().execute().await?;
        Ok(names.contains(&self.table_name))
    }

    async fn ensure_table(&self) -> Result<()> {
        if self.table_exists().await? {
            return Ok(());
        }
        let schema = build_chunk_schema(self.dim);
        let iter = RecordBatchIterator::new(vec![].into_iter(), schema);
        self.db
            .create_table(&self.table_name, Box::new(iter))
            .execute()
            .await?;
        Ok(())
    }

    /// Upserts chunks with their embeddings, keyed on chunk id.
    pub async fn upsert_chunks(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        ensure!(
            chunks.len() == embeddings.len(),
            "chunks and embeddings length mismatch: {} vs {}",
            chunks.len(),
            embeddings.len()
        );
        for embedding in embeddings {
            ensure!(
                embedding.len() == self.dim as usize,
                "embedding dim {} does not match table dim {}",
                embedding.len(),
                self.dim
            );
        }
        // '|' delimits the encoded programs column; a name containing it
        // would corrupt the round-trip and the LIKE pushdown.
        for chunk in chunks {
            for program in &chunk.metadata.programs {
                ensure!(
                    !program.contains('|'),
                    "program name '{program}' in chunk {} contains '|'",
                    chunk.chunk_id
                );
            }
        }
        self.ensure_table().await?;

        let batch = self.chunks_to_record_batch(chunks, embeddings)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let table = self.db.open_table(&self.table_name).execute().await?;
        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        let _ = merge.execute(reader).await?;
        debug!(chunks = chunks.len(), table = %self.table_name, "chunks upserted");
        Ok(())
    }

    /// Replaces the batch's documents wholesale: deletes every stored chunk
    /// of each document present in `chunks`, then upserts the new chunks. A
    /// document that shrank leaves no stale high-index chunks behind.
    pub async fn replace_documents(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        let doc_ids: BTreeSet<&str> = chunks.iter().map(|c| c.doc_id.as_str()).collect();
        for doc_id in doc_ids {
            self.delete_document(doc_id).await?;
        }
        self.upsert_chunks(chunks, embeddings).await
    }

    /// Removes every chunk belonging to `doc_id`.
    pub async fn delete_document(&self, doc_id: &str) -> Result<()> {
        if !self.table_exists().await? {
            return Ok(());
        }
        let table = self.db.open_table(&self.table_name).execute().await?;
        table
            .delete(&format!("doc_id = '{}'", doc_id.replace('\'', "''")))
            .await?;
        debug!(doc_id, "document chunks deleted");
        Ok(())
    }

    fn chunks_to_record_batch(
        &self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<RecordBatch> {
        let schema = build_chunk_schema(self.dim);
        let mut ids = Vec::new();
        let mut doc_ids = Vec::new();
        let mut chunk_indices = Vec::new();
        let mut texts = Vec::new();
        let mut doc_types: Vec<Option<String>> = Vec::new();
        let mut years: Vec<Option<i32>> = Vec::new();
        let mut programs = Vec::new();
        let mut outcomes: Vec<Option<String>> = Vec::new();
        let mut filenames: Vec<Option<String>> = Vec::new();
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            ids.push(chunk.chunk_id.clone());
            doc_ids.push(chunk.doc_id.clone());
            chunk_indices.push(i32::try_from(chunk.chunk_index).context("chunk_index overflow")?);
            texts.push(chunk.text.clone());
            doc_types.push(chunk.metadata.doc_type.clone());
            years.push(chunk.metadata.year);
            programs.push(encode_programs(&chunk.metadata.programs));
            outcomes.push(chunk.metadata.outcome.clone());
            filenames.push(chunk.metadata.filename.clone());
            vectors.push(Some(embedding.iter().map(|&x| Some(x)).collect()));
        }
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(doc_ids)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(doc_types)),
                Arc::new(Int32Array::from(years)),
                Arc::new(StringArray::from(programs)),
                Arc::new(StringArray::from(outcomes)),
                Arc::new(StringArray::from(filenames)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<
                    arrow_array::types::Float32Type,
                    _,
                    _,
                >(vectors.into_iter(), self.dim)),
            ],
        )?;
        Ok(batch)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("column '{name}' missing or not utf8"))
}

fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| anyhow!("column '{name}' missing or not int32"))
}

fn opt_string(array: &StringArray, row: usize) -> Option<String> {
    if array.is_null(row) {
        None
    } else {
        Some(array.value(row).to_string())
    }
}

fn row_to_chunk(batch: &RecordBatch, row: usize) -> Result<Chunk> {
    let years = int_column(batch, "year")?;
    let metadata = ChunkMetadata {
        doc_type: opt_string(string_column(batch, "doc_type")?, row),
        year: if years.is_null(row) {
            None
        } else {
            Some(years.value(row))
        },
        programs: decode_programs(string_column(batch, "programs")?.value(row)),
        outcome: opt_string(string_column(batch, "outcome")?, row),
        filename: opt_string(string_column(batch, "filename")?, row),
    };
    Ok(Chunk {
        chunk_id: string_column(batch, "id")?.value(row).to_string(),
        text: string_column(batch, "text")?.value(row).to_string(),
        doc_id: string_column(batch, "doc_id")?.value(row).to_string(),
        chunk_index: usize::try_from(int_column(batch, "chunk_index")?.value(row))
            .context("negative chunk_index in store")?,
        metadata,
    })
}

#[async_trait]
impl VectorStore for LanceChunkStore {
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filters: &DocumentFilters,
    ) -> Result<Vec<ScoredPoint>> {
        if !self.table_exists().await? {
            return Ok(Vec::new());
        }
        let table = self.db.open_table(&self.table_name).execute().await?;
        let mut query = table.vector_search(vector.to_vec())?.limit(top_k);
        if let Some(predicate) = filter_predicate(filters) {
            query = query.only_if(predicate);
        }
        let mut stream = query.execute().await?;
        let mut points = Vec::new();
        while let Some(batch) = TryStreamExt::try_next(&mut stream).await? {
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>());
            for row in 0..batch.num_rows() {
                let chunk = row_to_chunk(&batch, row)?;
                let score = distances.map_or(0.5, |d| 1.0 - d.value(row));
                points.push(ScoredPoint {
                    id: chunk.chunk_id,
                    score,
                    payload: ChunkPayload {
                        text: chunk.text,
                        doc_id: chunk.doc_id,
                        chunk_index: chunk.chunk_index,
                        metadata: chunk.metadata,
                    },
                });
            }
        }
        Ok(points)
    }
}

#[async_trait]
impl ChunkStore for LanceChunkStore {
    async fn scan_chunks(&self) -> Result<Vec<Chunk>> {
        if !self.table_exists().await? {
            return Ok(Vec::new());
        }
        let table = self.db.open_table(&self.table_name).execute().await?;
        let mut stream = table.query().execute().await?;
        let mut chunks = Vec::new();
        while let Some(batch) = TryStreamExt::try_next(&mut stream).await? {
            for row in 0..batch.num_rows() {
                chunks.push(row_to_chunk(&batch, row)?);
            }
        }
        Ok(chunks)
    }
}
