//! Shared LLM service with two profiles: `generation` and `embedding`.
//!
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Caches underlying HTTP clients per config (provider+endpoint+model+key+timeout).
//! - Implements [`TextGenerator`] over the generation profile so prompt chains
//!   can hold it behind a trait object.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    config::{
        default_config::{embedding_config_from_env, generation_config_from_env},
        llm_model_config::LlmModelConfig,
        llm_provider::LlmProvider,
    },
    error_handler::AiLlmError,
    generator::{BoxFuture, TextGenerator},
    health_service::{HealthService, HealthStatus},
    services::{ollama_service::OllamaService, open_ai_service::OpenAiService},
};

pub struct LlmServiceProfiles {
    generation: LlmModelConfig,
    embedding: LlmModelConfig,

    ollama: RwLock<HashMap<ClientKey, Arc<OllamaService>>>,
    openai: RwLock<HashMap<ClientKey, Arc<OpenAiService>>>,

    health: HealthService,
}

impl LlmServiceProfiles {
    pub fn new(
        generation: LlmModelConfig,
        embedding: LlmModelConfig,
        health_timeout_secs: Option<u64>,
    ) -> Result<Self, AiLlmError> {
        Ok(Self {
            generation,
            embedding,
            ollama: RwLock::new(HashMap::new()),
            openai: RwLock::new(HashMap::new()),
            health: HealthService::new(health_timeout_secs)?,
        })
    }

    /// Builds both profiles from environment variables.
    pub fn from_env() -> Result<Self, AiLlmError> {
        Self::new(
            generation_config_from_env()?,
            embedding_config_from_env()?,
            Some(10),
        )
    }

    /// Generates text with the generation profile.
    pub async fn generate(&self, prompt: &str) -> Result<String, AiLlmError> {
        let cfg = &self.generation;
        match cfg.provider {
            LlmProvider::Ollama => self.ollama_for(cfg).await?.generate(prompt).await,
            LlmProvider::OpenAI => self.openai_for(cfg).await?.generate(prompt).await,
        }
    }

    /// Computes an embedding with the embedding profile.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        let cfg = &self.embedding;
        match cfg.provider {
            LlmProvider::Ollama => self.ollama_for(cfg).await?.embeddings(input).await,
            LlmProvider::OpenAI => self.openai_for(cfg).await?.embeddings(input).await,
        }
    }

    /// Health snapshot for the distinct profiles.
    pub async fn health_all(&self) -> Vec<HealthStatus> {
        let mut list = vec![self.generation.clone()];
        if self.embedding != self.generation {
            list.push(self.embedding.clone());
        }
        self.health.check_many(&list).await
    }

    pub fn generation_config(&self) -> &LlmModelConfig {
        &self.generation
    }

    pub fn embedding_config(&self) -> &LlmModelConfig {
        &self.embedding
    }

    /* --------------------- Internals --------------------- */

    async fn ollama_for(&self, cfg: &LlmModelConfig) -> Result<Arc<OllamaService>, AiLlmError> {
        let key = ClientKey::from(cfg);
        if let Some(cli) = self.ollama.read().await.get(&key).cloned() {
            return Ok(cli);
        }
        let mut w = self.ollama.write().await;
        if let Some(cli) = w.get(&key).cloned() {
            return Ok(cli);
        }
        debug!(model = %cfg.model, "creating Ollama client");
        let cli = Arc::new(OllamaService::new(cfg.clone())?);
        w.insert(key, cli.clone());
        Ok(cli)
    }

    async fn openai_for(&self, cfg: &LlmModelConfig) -> Result<Arc<OpenAiService>, AiLlmError> {
        let key = ClientKey::from(cfg);
        if let Some(cli) = self.openai.read().await.get(&key).cloned() {
            return Ok(cli);
        }
        let mut w = self.openai.write().await;
        if let Some(cli) = w.get(&key).cloned() {
            return Ok(cli);
        }
        debug!(model = %cfg.model, "creating OpenAI client");
        let cli = Arc::new(OpenAiService::new(cfg.clone())?);
        w.insert(key, cli.clone());
        Ok(cli)
    }
}

impl TextGenerator for LlmServiceProfiles {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, AiLlmError>> {
        Box::pin(LlmServiceProfiles::generate(self, prompt))
    }

    fn model_name(&self) -> String {
        self.generation.model.clone()
    }
}

/// Cache key identifying a unique client config.
#[derive(Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    provider: LlmProvider,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Option<u64>,
}

impl From<&LlmModelConfig> for ClientKey {
    fn from(cfg: &LlmModelConfig) -> Self {
        Self {
            provider: cfg.provider,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
            timeout: cfg.timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clients_are_cached_per_config() {
        let generation = LlmModelConfig::ollama("http://127.0.0.1:9", "llama3");
        let embedding = LlmModelConfig::ollama("http://127.0.0.1:9", "nomic-embed-text");
        let svc = LlmServiceProfiles::new(generation.clone(), embedding, Some(1)).unwrap();

        let a = svc.ollama_for(&generation).await.unwrap();
        let b = svc.ollama_for(&generation).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(svc.model_name(), "llama3");
    }
}
