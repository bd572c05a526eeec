//! Liveness probes for the configured LLM backends.
//!
//! - Ollama: `GET {endpoint}/api/tags`, then look for the model tag.
//! - OpenAI: `GET {endpoint}/v1/models` with bearer auth, then look for the model id.
//!
//! [`HealthService::check`] never fails; transport and status errors are folded
//! into a `HealthStatus { ok: false, .. }` so `/health` can always answer.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::llm_model_config::LlmModelConfig;
use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{AiLlmError, HealthError, HttpError, make_snippet};

/// Serializable health snapshot for one model config.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub ok: bool,
    pub latency_ms: u128,
    pub message: String,
}

impl HealthStatus {
    fn new(cfg: &LlmModelConfig, ok: bool, latency_ms: u128, message: impl Into<String>) -> Self {
        Self {
            provider: format!("{:?}", cfg.provider),
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            ok,
            latency_ms,
            message: message.into(),
        }
    }
}

pub struct HealthService {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl HealthService {
    pub fn new(timeout_secs: Option<u64>) -> Result<Self, AiLlmError> {
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(10));
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }

    pub async fn check(&self, cfg: &LlmModelConfig) -> HealthStatus {
        let endpoint = cfg.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            warn!(provider = ?cfg.provider, endpoint = %cfg.endpoint, "invalid endpoint");
            return HealthStatus::new(cfg, false, 0, "endpoint is missing http/https");
        }

        let started = Instant::now();
        let probe = match cfg.provider {
            LlmProvider::Ollama => self.probe_ollama(cfg).await,
            LlmProvider::OpenAI => self.probe_openai(cfg).await,
        };
        let latency = started.elapsed().as_millis();

        let status = match probe {
            Ok((true, msg)) => HealthStatus::new(cfg, true, latency, msg),
            Ok((false, msg)) => HealthStatus::new(cfg, false, latency, msg),
            Err(e) => HealthStatus::new(cfg, false, latency, e.to_string()),
        };
        info!(
            provider = %status.provider,
            model = %status.model,
            ok = status.ok,
            latency_ms = status.latency_ms,
            "health probe completed"
        );
        status
    }

    pub async fn check_many(&self, configs: &[LlmModelConfig]) -> Vec<HealthStatus> {
        debug!(count = configs.len(), "running health probes");
        let mut out = Vec::with_capacity(configs.len());
        for cfg in configs {
            out.push(self.check(cfg).await);
        }
        out
    }

    fn timeout_for(&self, cfg: &LlmModelConfig) -> Duration {
        cfg.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout)
    }

    async fn probe_ollama(&self, cfg: &LlmModelConfig) -> Result<(bool, String), AiLlmError> {
        let url = format!("{}/api/tags", cfg.endpoint.trim_end_matches('/'));
        debug!("GET {}", url);
        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout_for(cfg))
            .send()
            .await?;
        let resp = ensure_success(resp, url).await?;

        #[derive(Deserialize)]
        struct Tag {
            name: String,
        }
        #[derive(Deserialize)]
        struct Tags {
            #[serde(default)]
            models: Vec<Tag>,
        }

        let tags: Tags = resp
            .json()
            .await
            .map_err(|e| HealthError::Decode(e.to_string()))?;
        let found = tags.models.iter().any(|t| tag_matches(&t.name, &cfg.model));
        Ok(if found {
            (true, "Ollama is healthy; model is available".into())
        } else {
            (false, "Ollama is up, but model is not pulled".into())
        })
    }

    async fn probe_openai(&self, cfg: &LlmModelConfig) -> Result<(bool, String), AiLlmError> {
        let url = format!("{}/v1/models", cfg.endpoint.trim_end_matches('/'));
        let api_key = cfg
            .api_key
            .as_deref()
            .ok_or_else(|| HealthError::Decode("missing OpenAI API key".into()))?;
        let auth = header::HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| HealthError::Decode(format!("invalid API key header: {e}")))?;

        debug!("GET {}", url);
        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout_for(cfg))
            .header(header::AUTHORIZATION, auth)
            .send()
            .await?;
        let resp = ensure_success(resp, url).await?;

        #[derive(Deserialize)]
        struct ModelItem {
            id: String,
        }
        #[derive(Deserialize)]
        struct Models {
            data: Vec<ModelItem>,
        }

        let models: Models = resp
            .json()
            .await
            .map_err(|e| HealthError::Decode(e.to_string()))?;
        let found = models.data.iter().any(|m| m.id == cfg.model);
        Ok(if found {
            (true, "OpenAI is healthy; model is available".into())
        } else {
            (false, "OpenAI is up, but model is not listed".into())
        })
    }
}

async fn ensure_success(
    resp: reqwest::Response,
    url: String,
) -> Result<reqwest::Response, AiLlmError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let snippet = make_snippet(&resp.text().await.unwrap_or_default());
    Err(HealthError::HttpStatus(HttpError {
        status,
        url,
        snippet,
    })
    .into())
}

/// Ollama reports `llama3:latest` for a model requested as `llama3`.
fn tag_matches(tag: &str, model: &str) -> bool {
    tag == model || (!model.contains(':') && tag.split(':').next() == Some(model))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_matching_accepts_implicit_latest() {
        assert!(tag_matches("llama3:latest", "llama3"));
        assert!(tag_matches("llama3:8b", "llama3:8b"));
        assert!(!tag_matches("llama3:8b", "llama3:70b"));
        assert!(!tag_matches("mistral:latest", "llama3"));
    }

    #[tokio::test]
    async fn invalid_endpoint_is_reported_not_raised() {
        let svc = HealthService::new(Some(1)).unwrap();
        let cfg = LlmModelConfig::ollama("localhost:11434", "llama3");
        let status = svc.check(&cfg).await;
        assert!(!status.ok);
        assert_eq!(status.latency_ms, 0);
    }
}
