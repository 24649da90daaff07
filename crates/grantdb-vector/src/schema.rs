//! Arrow schema for the chunk table.
//!
//! `programs` is a set; it is stored as a `|`-delimited string
//! (`|education|health|`) so membership can be pushed down with LIKE. An
//! empty set encodes as the empty string.

use arrow_schema::{DataType, Field, Schema};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const DEFAULT_TABLE_NAME: &str = "chunks";

pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("doc_id", DataType::Utf8, false),
        Field::new("chunk_index", DataType::Int32, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("doc_type", DataType::Utf8, true),
        Field::new("year", DataType::Int32, true),
        Field::new("programs", DataType::Utf8, false),
        Field::new("outcome", DataType::Utf8, true),
        Field::new("filename", DataType::Utf8, true),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
            true,
        ),
    ]))
}

pub fn encode_programs(programs: &BTreeSet<String>) -> String {
    if programs.is_empty() {
        String::new()
    } else {
        let joined = programs.iter().cloned().collect::<Vec<_>>().join("|");
        format!("|{joined}|")
    }
}

pub fn decode_programs(encoded: &str) -> BTreeSet<String> {
    encoded
        .split('|')
        .filter(|p| !p.is_empty())
        .map(ToString::to_string)
        .collect()
}
