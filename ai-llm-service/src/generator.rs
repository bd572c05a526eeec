//! Text generation seam consumed by prompt chains.
//!
//! Async is required because real providers perform HTTP requests; the
//! boxed-future shape keeps the trait object-safe so chains can hold
//! `Arc<dyn TextGenerator>`.

use std::sync::Arc;

use crate::error_handler::AiLlmError;

pub use futures::future::BoxFuture;

/// Anything able to turn a fully rendered prompt into model text.
pub trait TextGenerator: Send + Sync {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, AiLlmError>>;

    /// Short label for logs and response metadata.
    fn model_name(&self) -> String {
        "unknown".to_string()
    }
}

impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, AiLlmError>> {
        (**self).generate(prompt)
    }

    fn model_name(&self) -> String {
        (**self).model_name()
    }
}
