use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid filters: {0}")]
    InvalidFilters(String),

    /// Both retrieval paths failed; no grounding context is possible.
    /// A silently empty result would mislead the caller, so this is an error.
    #[error("Search unavailable (vector: {vector}; keyword: {keyword})")]
    SearchUnavailable { vector: String, keyword: String },
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
