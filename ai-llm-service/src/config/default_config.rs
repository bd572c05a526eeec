//! LLM profiles resolved strictly from environment variables.
//!
//! Two roles are used by the RAG service:
//!
//! - **Generation** → answers, classification, verification, summarization
//! - **Embedding**  → query/chunk vectors
//!
//! # Environment variables
//!
//! Common:
//! - `LLM_KIND` = `ollama` (default) or `openai`
//! - `LLM_MAX_TOKENS`, `LLM_TEMPERATURE`, `LLM_TIMEOUT_SECS` (optional)
//!
//! Ollama:
//! - `OLLAMA_URL` or `OLLAMA_PORT` = endpoint (mandatory)
//! - `OLLAMA_MODEL`                = generation model (mandatory)
//! - `EMBEDDING_MODEL`             = embedding model (mandatory)
//!
//! OpenAI:
//! - `OPENAI_API_KEY` (mandatory), `OPENAI_URL` (default `https://api.openai.com`)
//! - `OPENAI_MODEL` (mandatory), `OPENAI_EMBEDDING_MODEL` (mandatory)

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, ConfigError, env_opt, env_opt_f32, env_opt_u32, must_env,
        validate_http_endpoint, validate_range_f32,
    },
};

/// Resolves the Ollama endpoint.
///
/// Precedence: `OLLAMA_URL`, then `OLLAMA_PORT` → `http://localhost:{port}`.
fn ollama_endpoint() -> Result<String, AiLlmError> {
    if let Some(url) = env_opt("OLLAMA_URL") {
        validate_http_endpoint("OLLAMA_URL", &url)?;
        return Ok(url);
    }
    if let Some(port) = env_opt("OLLAMA_PORT") {
        port.trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidNumber {
                var: "OLLAMA_PORT",
                reason: "expected u16 (1..=65535)",
            })?;
        return Ok(format!("http://localhost:{}", port.trim()));
    }
    Err(AiLlmError::Config(ConfigError::MissingVar(
        "OLLAMA_URL or OLLAMA_PORT",
    )))
}

fn provider_from_env() -> Result<LlmProvider, AiLlmError> {
    match env_opt("LLM_KIND") {
        None => Ok(LlmProvider::Ollama),
        Some(kind) => LlmProvider::parse(&kind)
            .ok_or_else(|| ConfigError::UnsupportedProvider(kind).into()),
    }
}

fn openai_endpoint() -> Result<String, AiLlmError> {
    let url = env_opt("OPENAI_URL").unwrap_or_else(|| "https://api.openai.com".into());
    validate_http_endpoint("OPENAI_URL", &url)?;
    Ok(url)
}

/// Generation profile used by every prompt chain.
///
/// # Defaults
/// - `temperature = 0.1` (classification prompts need stable JSON)
/// - `timeout_secs = 600`
pub fn generation_config_from_env() -> Result<LlmModelConfig, AiLlmError> {
    let temperature = env_opt_f32("LLM_TEMPERATURE")?.unwrap_or(0.1);
    validate_range_f32("temperature", temperature, 0.0, 2.0)?;
    let max_tokens = env_opt_u32("LLM_MAX_TOKENS")?;
    let timeout_secs = env_opt_u32("LLM_TIMEOUT_SECS")?.map(u64::from).unwrap_or(600);

    let (provider, endpoint, model, api_key) = match provider_from_env()? {
        LlmProvider::Ollama => (
            LlmProvider::Ollama,
            ollama_endpoint()?,
            must_env("OLLAMA_MODEL")?,
            None,
        ),
        LlmProvider::OpenAI => (
            LlmProvider::OpenAI,
            openai_endpoint()?,
            must_env("OPENAI_MODEL")?,
            Some(must_env("OPENAI_API_KEY")?),
        ),
    };

    Ok(LlmModelConfig {
        provider,
        model,
        endpoint,
        api_key,
        max_tokens,
        temperature: Some(temperature),
        top_p: None,
        timeout_secs: Some(timeout_secs),
    })
}

/// Embedding profile used by encoders.
///
/// # Defaults
/// - `temperature = 0.0` (deterministic)
/// - `timeout_secs = 30`
pub fn embedding_config_from_env() -> Result<LlmModelConfig, AiLlmError> {
    let (provider, endpoint, model, api_key) = match provider_from_env()? {
        LlmProvider::Ollama => (
            LlmProvider::Ollama,
            ollama_endpoint()?,
            must_env("EMBEDDING_MODEL")?,
            None,
        ),
        LlmProvider::OpenAI => (
            LlmProvider::OpenAI,
            openai_endpoint()?,
            must_env("OPENAI_EMBEDDING_MODEL")?,
            Some(must_env("OPENAI_API_KEY")?),
        ),
    };
    if model.trim().is_empty() {
        return Err(ConfigError::EmptyModel.into());
    }

    Ok(LlmModelConfig {
        provider,
        model,
        endpoint,
        api_key,
        max_tokens: None,
        temperature: Some(0.0),
        top_p: None,
        timeout_secs: Some(30),
    })
}
