//! Unified error types for the crate.

use thiserror::Error;

/// Top-level error for rag-store operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// I/O or filesystem errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed persisted data (with location).
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid or unsupported configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Mismatch in vector dimensionality.
    #[error("vector size mismatch: got {got}, want {want}")]
    VectorSizeMismatch { got: usize, want: usize },

    /// Document chunks, raw chunks and embeddings disagree in length.
    #[error("document {id} is inconsistent: {detail}")]
    InconsistentDocument { id: String, detail: String },

    /// Embedding backend failed.
    #[error("encoder error: {0}")]
    Encoder(#[from] ai_llm_service::AiLlmError),

    /// Qdrant client errors (wrapped).
    #[error("qdrant error: {0}")]
    Qdrant(String),

    /// HTTP transport errors (Solr).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Sparse search backend answered with an error.
    #[error("sparse search error: {0}")]
    Sparse(String),
}
