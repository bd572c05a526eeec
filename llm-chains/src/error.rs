//! Typed error for the llm-chains crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    /// The underlying model call failed.
    #[error("LLM error: {0}")]
    Llm(#[from] ai_llm_service::AiLlmError),

    /// A `{placeholder}` in the template had no matching input.
    #[error("chain `{chain}` is missing input `{input}`")]
    MissingInput { chain: String, input: String },

    /// Only raised by scripted chains when their replies run out.
    #[error("chain `{0}` has no scripted reply left")]
    Exhausted(String),
}
