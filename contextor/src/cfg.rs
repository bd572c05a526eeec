//! Pipeline definitions: a JSON file of named pipelines plus an optional QA section.
//!
//! Loaded once at startup and validated before anything is built. Process
//! settings (`DATA_DIR`, `DECKARD_CONFIG`, ...) come from the environment.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use llm_chains::ResponseProcessor;
use rag_store::{ChunkerConfig, DistanceKind, QaEntry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ContextorError;

/* -------------------------------- components ------------------------------ */

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncoderConfig {
    /// Embeddings from the configured LLM embedding profile.
    Ollama {
        #[serde(default)]
        model: Option<String>,
        dim: usize,
    },
    /// Offline feature hashing.
    Hashing { dim: usize },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankerKind {
    Cosine,
    None,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RerankerConfig {
    pub kind: RerankerKind,
    #[serde(default = "default_max_raw_results")]
    pub max_raw_results: usize,
}

fn default_max_raw_results() -> usize {
    25
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatabaseConfig {
    Jsonl {
        name: String,
        #[serde(default)]
        distance: DistanceKind,
    },
    Qdrant {
        name: String,
        url: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        distance: DistanceKind,
        #[serde(default)]
        exact: bool,
    },
}

impl DatabaseConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Jsonl { name, .. } | Self::Qdrant { name, .. } => name,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextDatabaseConfig {
    Jsonl { name: String },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SparseSearchConfig {
    #[default]
    None,
    Keyword {
        name: String,
    },
    Solr {
        uri: String,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextBuilderKind {
    #[default]
    Simple,
    ParentDocument,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryProcessorKind {
    #[default]
    Raw,
    Standard,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Maximum context length in characters.
    pub size: usize,
    pub max_vector_distance: f32,
}

/// Which LLM stages the request coordinator runs for this pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    #[serde(default = "yes")]
    pub malicious_check: bool,
    #[serde(default = "yes")]
    pub compound: bool,
    #[serde(default = "yes")]
    pub verify: bool,
    #[serde(default = "yes")]
    pub extract_sources: bool,
}

fn yes() -> bool {
    true
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            malicious_check: true,
            compound: true,
            verify: true,
            extract_sources: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollectorConfig {
    Jsonl {
        path: PathBuf,
    },
    Directory {
        path: PathBuf,
        #[serde(default = "default_extensions")]
        extensions: Vec<String>,
    },
}

fn default_extensions() -> Vec<String> {
    vec!["md".into(), "txt".into()]
}

/* -------------------------------- pipelines ------------------------------- */

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub embedding_encoder: EncoderConfig,
    pub reranker: RerankerConfig,
    pub embedding_database: DatabaseConfig,
    pub context_database: ContextDatabaseConfig,
    #[serde(default)]
    pub sparse_search: SparseSearchConfig,
    #[serde(default)]
    pub context_builder: ContextBuilderKind,
    #[serde(default)]
    pub query_processor: QueryProcessorKind,
    #[serde(default)]
    pub response_processor: ResponseProcessor,
    pub context: ContextConfig,
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    #[serde(default)]
    pub collectors: Vec<CollectorConfig>,
    #[serde(default)]
    pub chunker: ChunkerConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QaConfig {
    pub name: String,
    pub top_k: usize,
    pub max_distance: f32,
    pub encoder: EncoderConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub questions: Vec<QaEntry>,
}

/// The whole definition file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeckardConfig {
    pub pipelines: BTreeMap<String, PipelineConfig>,
    #[serde(default)]
    pub qa: Option<QaConfig>,
}

impl DeckardConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ContextorError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ContextorError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let cfg = Self::from_json(&raw)?;
        info!(path = %path.display(), pipelines = cfg.pipelines.len(), qa = cfg.qa.is_some(), "pipeline config loaded");
        Ok(cfg)
    }

    pub fn from_json(raw: &str) -> Result<Self, ContextorError> {
        let cfg: Self = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ContextorError> {
        if self.pipelines.is_empty() {
            return Err(ContextorError::Config("no pipelines defined".into()));
        }
        for (key, p) in &self.pipelines {
            debug!(pipeline = %key, "validating pipeline");
            if p.name != *key {
                return Err(ContextorError::Config(format!(
                    "pipeline key '{key}' does not match its name '{}'",
                    p.name
                )));
            }
            if p.context.size == 0 {
                return Err(ContextorError::Config(format!("{key}: context.size must be > 0")));
            }
            if p.reranker.max_raw_results == 0 {
                return Err(ContextorError::Config(format!(
                    "{key}: reranker.max_raw_results must be >= 1"
                )));
            }
            if !p.context.max_vector_distance.is_finite() {
                return Err(ContextorError::Config(format!(
                    "{key}: context.max_vector_distance must be finite"
                )));
            }
            p.chunker
                .validate()
                .map_err(|e| ContextorError::Config(format!("{key}: {e}")))?;
        }

        if let Some(qa) = &self.qa {
            if qa.top_k == 0 {
                return Err(ContextorError::Config("qa.top_k must be >= 1".into()));
            }
            if !(0.0..=1.0).contains(&qa.max_distance) {
                return Err(ContextorError::Config(
                    "qa.max_distance must be within 0.0..=1.0".into(),
                ));
            }
            if self.pipelines.contains_key(&qa.name) {
                return Err(ContextorError::Config(format!(
                    "qa name '{}' collides with a pipeline",
                    qa.name
                )));
            }
        }
        Ok(())
    }

    pub fn pipeline(&self, name: &str) -> Result<&PipelineConfig, ContextorError> {
        self.pipelines
            .get(name)
            .ok_or_else(|| ContextorError::UnknownPipeline(name.to_string()))
    }

    pub fn pipeline_names(&self) -> Vec<String> {
        self.pipelines.keys().cloned().collect()
    }
}

/* ----------------------------------- env ---------------------------------- */

pub fn env(k: &str, dflt: &str) -> String {
    std::env::var(k).unwrap_or_else(|_| dflt.to_string())
}

pub fn parse<T: std::str::FromStr>(k: &str, dflt: T) -> T {
    std::env::var(k)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(dflt)
}

/// `DATA_DIR`, default `./data`.
pub fn data_dir() -> PathBuf {
    PathBuf::from(env("DATA_DIR", "./data"))
}

/// `DECKARD_CONFIG`, default `config.json`.
pub fn config_path() -> PathBuf {
    PathBuf::from(env("DECKARD_CONFIG", "config.json"))
}

#[cfg(test)]
pub(crate) const SAMPLE: &str = r#"{
  "pipelines": {
    "library": {
      "name": "library",
      "embedding_encoder": { "kind": "hashing", "dim": 64 },
      "reranker": { "kind": "cosine", "max_raw_results": 5 },
      "embedding_database": { "kind": "jsonl", "name": "library" },
      "context_database": { "kind": "jsonl", "name": "library" },
      "sparse_search": { "kind": "keyword", "name": "library" },
      "context_builder": "simple",
      "query_processor": "standard",
      "response_processor": "llama3",
      "context": { "size": 400, "max_vector_distance": 1.5 },
      "chunker": { "split_on": "\n\n", "chunk_size": 200, "overlap": 0, "add_document_metadata": false }
    }
  },
  "qa": {
    "name": "qa",
    "top_k": 3,
    "max_distance": 0.5,
    "encoder": { "kind": "hashing", "dim": 64 },
    "database": { "kind": "jsonl", "name": "qa" },
    "questions": [
      { "queries": ["library hours"], "response": "9-5",
        "links": [ { "label": "Hours", "url": "https://lib.example/hours" } ] }
    ]
  }
}"#;
