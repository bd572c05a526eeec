//! Text encoders.
//!
//! Async is required because most real providers (Ollama, OpenAI, etc.)
//! perform HTTP requests.

use futures::future::BoxFuture;

use crate::errors::RagError;

pub mod hashing;
pub mod ollama;

/// Turns text into a fixed-size vector.
pub trait Encoder: Send + Sync {
    fn encode<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, RagError>>;

    /// Expected output dimension.
    fn dim(&self) -> usize;

    /// Label for logs and build reports.
    fn describe(&self) -> String;
}

pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;
