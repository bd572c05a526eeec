use serde::Serialize;

use crate::config::llm_provider::LlmProvider;

/// Configuration for one LLM profile (generation or embedding).
///
/// Serializable so a snapshot can be attached to response metadata; the API
/// key is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmModelConfig {
    /// The LLM provider/backend.
    pub provider: LlmProvider,

    /// Model identifier string (e.g., `"llama3:8b"`).
    pub model: String,

    /// Inference endpoint base URL.
    pub endpoint: String,

    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,

    /// Optional request timeout (in seconds).
    pub timeout_secs: Option<u64>,
}

impl LlmModelConfig {
    /// Minimal local Ollama profile, handy for tests and CLI defaults.
    pub fn ollama(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Ollama,
            model: model.into(),
            endpoint: endpoint.into(),
            api_key: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            timeout_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_is_not_serialized() {
        let mut cfg = LlmModelConfig::ollama("http://localhost:11434", "llama3");
        cfg.api_key = Some("sk-secret".into());
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(json.contains("llama3"));
    }
}
