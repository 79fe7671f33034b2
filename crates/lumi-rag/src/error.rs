//! Error types for lumi-rag.

use std::path::PathBuf;

/// Errors that can occur while building, loading, or querying an index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading documents or the index file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider error (embedding or chat).
    #[error("LLM error: {0}")]
    Llm(#[from] lumi_llm::LlmError),

    /// Index file does not exist and no build was requested.
    #[error("index {} not found — run a reindex first", .0.display())]
    NotFound(PathBuf),

    /// No documents found, or all documents chunked to nothing.
    #[error("no chunks produced from the corpus")]
    EmptyCorpus,

    /// Chunking parameters that would never advance the window.
    #[error("invalid chunking: overlap {overlap} must be smaller than max size {max_size}")]
    InvalidChunking { max_size: usize, overlap: usize },

    /// Tokenizer loading or encode/decode failure.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Persisted index violates its structural invariants.
    #[error("corrupt index: {0}")]
    Corrupt(String),

    /// Index was built with a different embedding model than the query.
    #[error("index was built with embedding model {indexed}, queried with {queried}")]
    ModelMismatch { indexed: String, queried: String },

    /// Query vector width differs from the stored vectors.
    #[error("query embedding has {queried} dimensions, index has {indexed}")]
    DimensionMismatch { indexed: usize, queried: usize },

    /// Generic catch-all error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
