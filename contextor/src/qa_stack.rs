//! Curated question/answer lookup, consulted before the RAG pipelines.

use std::sync::Arc;

use llm_chains::{Chain, FAIL_RESPONSE, QaLink, QaResponder};
use rag_store::{Encoder, ResultTable, VectorStore};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::cfg::QaConfig;
use crate::error::ContextorError;

#[derive(Clone, Debug, Serialize)]
pub struct QaResponse {
    pub has_response: bool,
    pub response: String,
    pub links: Vec<QaLink>,
    pub metadata: Vec<Value>,
}

pub struct QaStack {
    pub(crate) config: QaConfig,
    pub(crate) encoder: Arc<dyn Encoder>,
    pub(crate) store: Arc<dyn VectorStore>,
}

impl QaStack {
    pub fn config(&self) -> &QaConfig {
        &self.config
    }

    pub fn has_questions(&self) -> bool {
        !self.config.questions.is_empty()
    }

    /// Looks up stored phrasings close to `query` and lets `chain` decide
    /// whether one of them answers it. No nearby phrasing means no chain call.
    #[instrument(skip_all, fields(qa = %self.config.name))]
    pub async fn query(
        &self,
        query: &str,
        chain: Arc<dyn Chain>,
        llm_config: &Value,
    ) -> Result<QaResponse, ContextorError> {
        let rows = self.search(query).await?;
        let mut metadata = vec![
            json!({ "vector_results": rows }),
            json!({ "configuration": serde_json::to_value(&self.config)? }),
            json!({ "api_llm": llm_config }),
        ];

        if rows.is_empty() {
            info!(%query, "no QA phrasing within distance");
            return Ok(QaResponse {
                has_response: false,
                response: FAIL_RESPONSE.to_string(),
                links: Vec::new(),
                metadata,
            });
        }

        let qa_data: Vec<Value> = rows
            .iter()
            .map(|r| {
                json!({
                    "question": r.metadata.get("question").cloned().unwrap_or(Value::Null),
                    "response": r.metadata.get("response").cloned().unwrap_or(Value::Null),
                    "links": r.metadata.get("links").cloned().unwrap_or_else(|| json!([])),
                })
            })
            .collect();
        debug!(candidates = qa_data.len(), "checking QA candidates");

        let verdict = QaResponder::new(chain).respond(query, &qa_data).await?;
        metadata.push(json!({ "qa_verdict": verdict.has_response }));

        Ok(QaResponse {
            has_response: verdict.has_response,
            response: verdict.response,
            links: verdict.links,
            metadata,
        })
    }

    /// Nearest stored phrasings, at most `top_k` within `max_distance`.
    pub async fn search(&self, query: &str) -> Result<ResultTable, ContextorError> {
        let vector = self.encoder.encode(query).await?;
        let rows = self
            .store
            .query(&vector, self.config.top_k, self.config.max_distance)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{DeckardConfig, SAMPLE};
    use llm_chains::ScriptedChain;
    use rag_store::{DistanceKind, HashingEmbedder, JsonlVectorStore, NoopProgress, QaBuilder};

    async fn stack(dir: &tempfile::TempDir) -> QaStack {
        let config = DeckardConfig::from_json(SAMPLE).unwrap().qa.unwrap();
        let encoder: Arc<dyn Encoder> = Arc::new(HashingEmbedder::new(64));
        let store: Arc<dyn VectorStore> = Arc::new(
            JsonlVectorStore::open(dir.path().join("qa.jsonl"), DistanceKind::Cosine).unwrap(),
        );
        QaBuilder {
            encoder: encoder.clone(),
            store: store.clone(),
            questions: config.questions.clone(),
        }
        .build(&NoopProgress)
        .await
        .unwrap();
        QaStack {
            config,
            encoder,
            store,
        }
    }

    #[tokio::test]
    async fn close_phrasing_goes_to_the_responder() {
        let dir = tempfile::tempdir().unwrap();
        let qa = stack(&dir).await;
        assert!(qa.has_questions());

        let chain = Arc::new(ScriptedChain::always(
            "qa",
            r#"{"match": true, "response": "9-5", "links": [{"text": "Hours", "url": "https://lib.example/hours"}]}"#,
        ));
        let out = qa
            .query("library hours", chain.clone(), &json!({}))
            .await
            .unwrap();
        assert!(out.has_response);
        assert_eq!(out.response, "9-5");
        assert_eq!(out.links[0].url, "https://lib.example/hours");

        let sent = chain.calls()[0].get("qa_data").unwrap().to_string();
        assert!(sent.contains("\"9-5\""));
        assert!(sent.contains("library hours"));
    }

    #[tokio::test]
    async fn distant_query_skips_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let qa = stack(&dir).await;
        let chain = Arc::new(ScriptedChain::always("qa", r#"{"match": true, "response": "x"}"#));
        let out = qa
            .query("quantum chromodynamics lecture", chain.clone(), &json!({}))
            .await
            .unwrap();
        assert!(!out.has_response);
        assert_eq!(out.response, FAIL_RESPONSE);
        assert_eq!(chain.call_count(), 0);
        assert!(out.metadata[0]["vector_results"].is_array());
    }
}
