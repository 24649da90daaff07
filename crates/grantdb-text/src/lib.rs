//! grantdb-text
//!
//! In-memory lexical (BM25) index over the chunk corpus. The index is built
//! from a full scan of the chunk store and replaced atomically on rebuild,
//! so in-flight queries always see a complete snapshot.

pub mod index;

pub use index::KeywordIndex;
