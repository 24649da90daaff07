//! grantdb-hybrid
//!
//! Fuses the semantic and lexical retrieval paths into one ranked,
//! deduplicated, diversified result list. The fusion, recency, and
//! diversification stages are pure functions; `RetrievalEngine` wires them
//! behind a single `retrieve` call.

pub mod diversify;
pub mod engine;
pub mod fuse;
pub mod recency;

pub use engine::RetrievalEngine;
