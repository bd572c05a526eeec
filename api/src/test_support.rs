//! Offline state for handler and coordinator tests: hashing encoders, JSONL
//! stores in a temp dir and a scripted chain per slot.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use contextor::{DeckardConfig, Registry};
use futures::future::BoxFuture;
use llm_chains::{Chain, ChainError, ChainInputs, Chains, ScriptedChain};
use rag_store::NoopProgress;
use tempfile::TempDir;

use crate::core::app_context::{AppContext, ChainSource};
use crate::core::app_state::AppState;
use crate::core::lock::PerRequestLock;

const DOCS: &str = concat!(
    r#"{"content": "The library is open from nine to five on weekdays.", "metadata": {"title": "Hours", "url": "https://lib.example/hours"}}"#,
    "\n",
    r#"{"content": "Paris is the capital of France.", "metadata": {"title": "France", "url": "https://geo.example/france"}}"#,
    "\n",
    r#"{"content": "The current president of France is Emmanuel Macron.", "metadata": {"title": "President"}}"#,
    "\n"
);

fn config(docs: &std::path::Path) -> String {
    format!(
        r#"{{
  "pipelines": {{
    "library": {{
      "name": "library",
      "embedding_encoder": {{ "kind": "hashing", "dim": 64 }},
      "reranker": {{ "kind": "cosine", "max_raw_results": 5 }},
      "embedding_database": {{ "kind": "jsonl", "name": "library" }},
      "context_database": {{ "kind": "jsonl", "name": "library" }},
      "sparse_search": {{ "kind": "keyword", "name": "library" }},
      "context_builder": "simple",
      "query_processor": "standard",
      "response_processor": "none",
      "context": {{ "size": 400, "max_vector_distance": 2.0 }},
      "collectors": [ {{ "kind": "jsonl", "path": {docs} }} ]
    }}
  }},
  "qa": {{
    "name": "qa",
    "top_k": 3,
    "max_distance": 0.5,
    "encoder": {{ "kind": "hashing", "dim": 64 }},
    "database": {{ "kind": "jsonl", "name": "qa" }},
    "questions": [
      {{ "queries": ["library hours"], "response": "9-5",
        "links": [ {{ "label": "Hours", "url": "https://lib.example/hours" }} ] }}
    ]
  }}
}}"#,
        docs = serde_json::to_string(&docs.to_string_lossy()).unwrap()
    )
}

/// One scripted chain per slot; replace fields to change a stage's replies.
#[derive(Clone)]
pub(crate) struct Scripts {
    pub context_only: Arc<ScriptedChain>,
    pub context_plus: Arc<ScriptedChain>,
    pub malicious: Arc<ScriptedChain>,
    pub compound: Arc<ScriptedChain>,
    pub verify: Arc<ScriptedChain>,
    pub summarize: Arc<ScriptedChain>,
    pub sources: Arc<ScriptedChain>,
    pub qa: Arc<ScriptedChain>,
    /// Sleep before every `context_only` reply, as a slow model would.
    pub context_delay: Option<Duration>,
}

impl Default for Scripts {
    fn default() -> Self {
        let always = |name: &str, reply: &str| Arc::new(ScriptedChain::always(name, reply));
        Self {
            context_only: always("context_only", "The library is open from nine to five."),
            context_plus: always("context_plus", "Nine to five, most days."),
            malicious: always("malicious", r#"{"classification": "Safe", "reason": "benign"}"#),
            // no JSON: the original query becomes the only sub-query
            compound: always("compound", "single question"),
            verify: always("verify", r#"{"is_answer": true, "reason": "grounded"}"#),
            summarize: always("summarize", "Summary."),
            sources: always(
                "sources",
                r#"{"found": true, "reason": "cited", "source_urls": ["https://lib.example/hours"]}"#,
            ),
            qa: always(
                "qa",
                r#"{"match": true, "response": "9-5", "links": [{"label": "Hours", "url": "https://lib.example/hours"}]}"#,
            ),
            context_delay: None,
        }
    }
}

impl Scripts {
    fn chains(&self) -> Chains {
        Chains {
            context_only: match self.context_delay {
                Some(delay) => Arc::new(SlowChain {
                    inner: self.context_only.clone(),
                    delay,
                }),
                None => self.context_only.clone(),
            },
            context_plus: self.context_plus.clone(),
            malicious: self.malicious.clone(),
            compound: self.compound.clone(),
            verify: self.verify.clone(),
            summarize: self.summarize.clone(),
            sources: self.sources.clone(),
            qa: self.qa.clone(),
        }
    }
}

struct SlowChain {
    inner: Arc<ScriptedChain>,
    delay: Duration,
}

impl Chain for SlowChain {
    fn invoke<'a>(&'a self, inputs: &'a ChainInputs) -> BoxFuture<'a, Result<String, ChainError>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.inner.invoke(inputs).await
        })
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

pub(crate) struct Harness {
    pub dir: TempDir,
    pub state: Arc<AppState>,
    pub scripts: Scripts,
}

impl Harness {
    /// Per-request state over freshly built library and QA stores.
    pub async fn new(scripts: Scripts) -> Self {
        Self::build(scripts, false).await
    }

    /// Same, but heavy objects are cached between requests.
    pub async fn cached(scripts: Scripts) -> Self {
        Self::build(scripts, true).await
    }

    async fn build(scripts: Scripts, keep: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs.jsonl");
        std::fs::write(&docs, DOCS).unwrap();
        let config = DeckardConfig::from_json(&config(&docs)).unwrap();

        let registry = Registry::new(dir.path(), None);
        let pipeline = config.pipeline("library").unwrap();
        registry
            .rag_builder(pipeline)
            .await
            .unwrap()
            .build(&NoopProgress)
            .await
            .unwrap();
        let qa = config.qa.as_ref().unwrap();
        registry
            .qa_builder(qa)
            .unwrap()
            .build(&NoopProgress)
            .await
            .unwrap();

        let context = AppContext::new(
            config,
            registry,
            ChainSource::Fixed(scripts.chains()),
            keep,
        );
        let lock = Arc::new(PerRequestLock::new(dir.path().join("gpu.lock")));
        let state = Arc::new(AppState::new(context, lock, None, dir.path()));
        Self {
            dir,
            state,
            scripts,
        }
    }

    /// Files directly under `<data_dir>/<sub>`; empty when it does not exist.
    pub fn log_files(&self, sub: &str) -> Vec<PathBuf> {
        std::fs::read_dir(self.dir.path().join(sub))
            .map(|entries| entries.filter_map(|e| e.ok().map(|e| e.path())).collect())
            .unwrap_or_default()
    }
}
