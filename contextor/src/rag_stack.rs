//! One pipeline's retrieval and generation, end to end.
//!
//! `query` runs: normalize → encode → vector query (bounded by
//! `max_raw_results` and `max_vector_distance`) → rerank ‖ sparse search →
//! interleave → build context → chain. An empty context short-circuits with
//! the no-context sentinel and the chain is never called.

use std::sync::Arc;

use llm_chains::{Chain, ChainInputs, NO_CONTEXT_RESPONSE};
use rag_store::{ContextStore, Encoder, Reranker, ResultTable, SparseSearch, VectorStore};
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::cfg::PipelineConfig;
use crate::context::{ContextBuilder, ContextBundle};
use crate::error::ContextorError;
use crate::query::QueryProcessor;
use crate::select::interleave;

/// Row cap for [`RagStack::search`].
pub const MAX_CONTEXTS: usize = 10;

/// Outcome of one RAG query.
#[derive(Clone, Debug)]
pub struct RagResponse {
    pub response: String,
    /// True when no context was found and the sentinel was returned.
    pub fail: bool,
    /// Ordered metadata entries, appended at each step and never overwritten.
    pub metadata: Vec<Value>,
    /// Rows the context was built from, dense and sparse merged.
    pub results: ResultTable,
    pub context: ContextBundle,
}

pub struct RagStack {
    pub(crate) config: PipelineConfig,
    pub(crate) encoder: Arc<dyn Encoder>,
    pub(crate) reranker: Arc<dyn Reranker>,
    pub(crate) vectors: Arc<dyn VectorStore>,
    pub(crate) contexts: Arc<dyn ContextStore>,
    pub(crate) sparse: Option<Arc<dyn SparseSearch>>,
    pub(crate) context_builder: Box<dyn ContextBuilder>,
    pub(crate) query_processor: Box<dyn QueryProcessor>,
}

impl RagStack {
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Answers `query` with `chain`. `llm_config` is only recorded in the metadata.
    ///
    /// # Errors
    /// Encoder, store and chain failures propagate; no rows is not an error.
    #[instrument(skip_all, fields(pipeline = %self.config.name))]
    pub async fn query(
        &self,
        query: &str,
        chain: &dyn Chain,
        llm_config: &Value,
    ) -> Result<RagResponse, ContextorError> {
        let embedding_query = self.query_processor.embedding_query(query);
        info!(%query, %embedding_query, "rag query");

        let vector = self.encoder.encode(&embedding_query).await?;
        let raw = self
            .vectors
            .query(
                &vector,
                self.reranker.max_raw_results(),
                self.config.context.max_vector_distance,
            )
            .await?;
        debug!(rows = raw.len(), "vector results");

        let rerank = self.reranker.rerank(&embedding_query, raw);
        let sparse = async {
            match &self.sparse {
                Some(s) => s.search(&embedding_query).await,
                None => Ok(ResultTable::default()),
            }
        };
        let (reranked, sparse_results) = futures::try_join!(rerank, sparse)?;

        let merged = interleave(&reranked, &sparse_results);
        let context = self
            .context_builder
            .build_context(&merged, self.contexts.as_ref(), self.config.context.size)
            .await?;

        let mut metadata = vec![
            json!({ "embedding_query": embedding_query }),
            json!({ "vector_results": reranked }),
            json!({ "sparse_results": sparse_results }),
            context.metadata.clone(),
        ];
        metadata.push(json!({ "configuration": serde_json::to_value(&self.config)? }));
        metadata.push(json!({ "api_llm": llm_config }));

        if context.is_empty() {
            info!(%query, "no context found");
            return Ok(RagResponse {
                response: NO_CONTEXT_RESPONSE.to_string(),
                fail: true,
                metadata,
                results: merged,
                context,
            });
        }

        let inputs = ChainInputs::new()
            .with("context", context.context.as_str())
            .with("query", query);
        let response = chain.invoke(&inputs).await?;
        debug!(response_len = response.len(), "chain answered");

        Ok(RagResponse {
            response,
            fail: false,
            metadata,
            results: merged,
            context,
        })
    }

    /// Raw nearest rows for `query`, no processing or reranking.
    #[instrument(skip_all, fields(pipeline = %self.config.name))]
    pub async fn search(&self, query: &str) -> Result<ResultTable, ContextorError> {
        let vector = self.encoder.encode(query).await?;
        let rows = self
            .vectors
            .query(&vector, MAX_CONTEXTS, self.config.context.max_vector_distance)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{DeckardConfig, SAMPLE};
    use crate::context::builder_for;
    use crate::query::processor_for;
    use llm_chains::ScriptedChain;
    use rag_store::{
        CosineReranker, DistanceKind, Document, HashingEmbedder, JsonlContextStore,
        JsonlVectorStore, KeywordIndex,
    };

    struct Fixture {
        _dir: tempfile::TempDir,
        stack: RagStack,
    }

    async fn fixture(docs: &[&str]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = DeckardConfig::from_json(SAMPLE)
            .unwrap()
            .pipeline("library")
            .unwrap()
            .clone();
        let encoder: Arc<dyn Encoder> = Arc::new(HashingEmbedder::new(64));
        let vectors =
            Arc::new(JsonlVectorStore::open(dir.path().join("v.jsonl"), DistanceKind::Cosine).unwrap());
        let contexts = Arc::new(JsonlContextStore::open(dir.path().join("c.jsonl")).unwrap());
        let sparse = Arc::new(KeywordIndex::open(dir.path().join("k.jsonl")).unwrap());

        let mut id = 0;
        for (i, text) in docs.iter().enumerate() {
            let doc = Document {
                id: format!("doc-{i}"),
                raw_chunks: vec![text.to_string()],
                chunks: vec![text.to_string()],
                embeddings: vec![encoder.encode(text).await.unwrap()],
                metadata: Default::default(),
            };
            id = vectors.add_embeddings(&doc, id, i == 0).await.unwrap();
            contexts.add_contexts(&doc, i == 0).await.unwrap();
            sparse.index_document(&doc).await.unwrap();
        }

        let stack = RagStack {
            reranker: Arc::new(CosineReranker::new(encoder.clone(), config.reranker.max_raw_results)),
            context_builder: builder_for(config.context_builder),
            query_processor: processor_for(config.query_processor),
            config,
            encoder,
            vectors,
            contexts,
            sparse: Some(sparse as Arc<dyn SparseSearch>),
        };
        Fixture { _dir: dir, stack }
    }

    #[tokio::test]
    async fn empty_store_returns_sentinel_without_calling_chain() {
        let f = fixture(&[]).await;
        let chain = ScriptedChain::always("context_only", "should not be used");
        let out = f
            .stack
            .query("What are the library hours?", &chain, &json!({"model": "m"}))
            .await
            .unwrap();
        assert!(out.fail);
        assert_eq!(out.response, NO_CONTEXT_RESPONSE);
        assert_eq!(chain.call_count(), 0);
        assert!(!out.metadata.is_empty());
    }

    #[tokio::test]
    async fn context_and_original_query_reach_the_chain() {
        let f = fixture(&["the library hours are nine to five", "parking is in lot b"]).await;
        let chain = ScriptedChain::always("context_only", "Nine to five.");
        let out = f
            .stack
            .query("What are the library hours?", &chain, &json!({}))
            .await
            .unwrap();
        assert!(!out.fail);
        assert_eq!(out.response, "Nine to five.");

        let calls = chain.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].get("query"), Some("What are the library hours?"));
        assert!(calls[0].get("context").unwrap().contains("nine to five"));
        assert!(out.context.context.chars().count() <= 400);
    }

    #[tokio::test]
    async fn metadata_is_appended_in_pipeline_order() {
        let f = fixture(&["the library hours are nine to five"]).await;
        let chain = ScriptedChain::always("context_only", "ok");
        let out = f
            .stack
            .query("What are the library hours?", &chain, &json!({"model": "m"}))
            .await
            .unwrap();
        let keys: Vec<&str> = out
            .metadata
            .iter()
            .map(|m| m.as_object().unwrap().keys().next().unwrap().as_str())
            .collect();
        assert_eq!(
            keys,
            [
                "embedding_query",
                "vector_results",
                "sparse_results",
                "contextbuilder",
                "configuration",
                "api_llm"
            ]
        );
        assert_eq!(out.metadata[0]["embedding_query"], "library hours");
        assert_eq!(out.metadata[5]["api_llm"]["model"], "m");
    }

    #[tokio::test]
    async fn search_returns_nearest_rows() {
        let f = fixture(&["solar panels on the roof", "library hours"]).await;
        let rows = f.stack.search("library hours").await.unwrap();
        assert_eq!(rows.rows()[0].text, "library hours");
        assert!(rows.len() <= MAX_CONTEXTS);
    }
}
