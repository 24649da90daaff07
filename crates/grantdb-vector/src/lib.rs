//! grantdb-vector
//!
//! LanceDB-backed chunk storage and the semantic search path. The store owns
//! the chunk table (text + metadata + embedding per row), translates
//! [`DocumentFilters`](grantdb_core::types::DocumentFilters) into SQL
//! predicates for pushdown, and doubles as the full-scan source for the
//! keyword index build.

pub mod client;
pub mod filter;
pub mod schema;
pub mod store;

pub use client::VectorSearchClient;
pub use schema::DEFAULT_TABLE_NAME;
pub use store::LanceChunkStore;
