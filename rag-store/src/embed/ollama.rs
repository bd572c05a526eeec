//! Embeddings through the shared LLM service (embedding profile).

use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use futures::future::BoxFuture;
use tracing::{error, trace};

use crate::embed::Encoder;
use crate::errors::RagError;

#[derive(Clone)]
pub struct OllamaEmbedder {
    svc: Arc<LlmServiceProfiles>,
    dim: usize,
}

impl OllamaEmbedder {
    pub fn new(svc: Arc<LlmServiceProfiles>, dim: usize) -> Self {
        Self { svc, dim }
    }
}

impl Encoder for OllamaEmbedder {
    fn encode<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, RagError>> {
        Box::pin(async move {
            trace!(text_len = text.len(), "encoding");
            let v = self.svc.embed(text).await?;
            if v.len() != self.dim {
                error!(got = v.len(), want = self.dim, "embedding dimension mismatch");
                return Err(RagError::VectorSizeMismatch {
                    got: v.len(),
                    want: self.dim,
                });
            }
            Ok(v)
        })
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn describe(&self) -> String {
        format!("ollama:{}", self.svc.embedding_config().model)
    }
}
