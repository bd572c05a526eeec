//! Typed error for the contextor crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextorError {
    /// Errors from the storage layer (encoders, stores, sparse search).
    #[error("RAG error: {0}")]
    Rag(#[from] rag_store::RagError),

    /// Upstream model failure inside a chain.
    #[error("chain error: {0}")]
    Chain(#[from] llm_chains::ChainError),

    /// LLM profiles could not be built.
    #[error("llm error: {0}")]
    Llm(#[from] ai_llm_service::AiLlmError),

    /// Invalid pipeline definition.
    #[error("config error: {0}")]
    Config(String),

    #[error("unknown pipeline: {0}")]
    UnknownPipeline(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
