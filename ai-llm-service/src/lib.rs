//! Shared LLM access for the RAG workspace.
//!
//! - [`config`]: provider/model configuration resolved from environment variables
//! - [`services`]: thin Ollama and OpenAI HTTP clients
//! - [`service_profiles`]: generation + embedding profiles with a client cache
//! - [`health_service`]: resilient provider probes for `/health`
//! - [`generator`]: the [`TextGenerator`] seam used by prompt chains

pub mod config;
pub mod error_handler;
pub mod generator;
pub mod health_service;
pub mod service_profiles;
pub mod services;
pub mod telemetry;

pub use config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider};
pub use error_handler::{AiLlmError, Result};
pub use generator::{BoxFuture, TextGenerator};
pub use health_service::{HealthService, HealthStatus};
pub use service_profiles::LlmServiceProfiles;
