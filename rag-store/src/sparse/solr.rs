//! Solr core as a sparse index.
//!
//! The core schema must define `document_id`, `chunk_id`, `document`,
//! `document_stemmed`, `document_ngram` and `metadata` (a JSON string).

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use serde_json::{Map, Value, json};
use services::uuid::gen_uuid;
use tracing::{debug, info, instrument, warn};

use crate::errors::RagError;
use crate::record::{Document, ResultRow, ResultTable};
use crate::sparse::{SPARSE_ROWS, SparseSearch, normalize_scores};

/// Boost applied to the exact-phrase match on the stemmed field.
const EXACT_BOOST: f32 = 3.0;

pub struct SolrSparseSearch {
    http: Client,
    uri: String,
}

impl SolrSparseSearch {
    /// Connects to the core at `uri` (e.g. `http://localhost:8983/solr/deckard`)
    /// and fails unless it answers a ping.
    pub async fn connect(uri: impl Into<String>) -> Result<Self, RagError> {
        let uri = uri.into().trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let me = Self { http, uri };
        me.ping().await?;
        info!(uri = %me.uri, "solr core reachable");
        Ok(me)
    }

    #[instrument(skip_all, fields(uri = %self.uri))]
    pub async fn ping(&self) -> Result<(), RagError> {
        let resp = self
            .http
            .get(format!("{}/admin/ping", self.uri))
            .timeout(Duration::from_secs(5))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RagError::Sparse(format!(
                "solr ping answered {}",
                resp.status()
            )));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(uri = %self.uri))]
    async fn commit(&self) -> Result<(), RagError> {
        let resp = self
            .http
            .get(format!("{}/update?commit=true", self.uri))
            .send()
            .await?;
        check(resp.status(), "commit")
    }

    #[instrument(skip_all, fields(uri = %self.uri, doc_id = %doc.id))]
    async fn post_chunks(&self, doc: &Document) -> Result<(), RagError> {
        let metadata = serde_json::to_string(&doc.metadata)?;
        for (idx, chunk) in doc.raw_chunks.iter().enumerate() {
            let body = json!([{
                "id": gen_uuid(),
                "document_id": doc.id,
                "chunk_id": idx,
                "document": chunk,
                "metadata": metadata,
            }]);
            let resp = self
                .http
                .post(format!("{}/update", self.uri))
                .json(&body)
                .send()
                .await?;
            check(resp.status(), "update")?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(uri = %self.uri))]
    async fn select(&self, query: &str) -> Result<Vec<Value>, RagError> {
        let q = solr_query(query, EXACT_BOOST);
        let rows = SPARSE_ROWS.to_string();
        let resp = self
            .http
            .get(format!("{}/select", self.uri))
            .query(&[
                ("q", q.as_str()),
                ("fl", "id,document_id,chunk_id,document,score,metadata"),
                ("rows", rows.as_str()),
            ])
            .send()
            .await?;
        check(resp.status(), "select")?;
        let body: Value = resp.json().await?;
        Ok(body
            .pointer("/response/docs")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }
}

impl SparseSearch for SolrSparseSearch {
    fn flush_data(&self) -> BoxFuture<'_, Result<(), RagError>> {
        Box::pin(async move {
            let resp = self
                .http
                .post(format!("{}/update?commit=true", self.uri))
                .json(&json!({"delete": {"query": "*:*"}}))
                .send()
                .await?;
            check(resp.status(), "flush")?;
            info!(uri = %self.uri, "solr index flushed");
            Ok(())
        })
    }

    fn index_document<'a>(&'a self, doc: &'a Document) -> BoxFuture<'a, Result<(), RagError>> {
        Box::pin(async move {
            self.post_chunks(doc).await?;
            self.commit().await
        })
    }

    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<ResultTable, RagError>> {
        Box::pin(async move {
            let docs = self.select(query).await?;
            let table = rows_from_docs(&docs);
            debug!(returned = table.len(), "solr search");
            Ok(table)
        })
    }

    fn describe(&self) -> String {
        format!("solr:{}", self.uri)
    }
}

fn check(status: reqwest::StatusCode, op: &str) -> Result<(), RagError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(RagError::Sparse(format!("solr {op} answered {status}")))
    }
}

/// Exact phrase on the stemmed field, boosted, OR the squashed query on the n-gram field.
fn solr_query(query: &str, boost: f32) -> String {
    let phrase = query.replace('"', "\\\"");
    let squashed: String = query
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    format!(r#"document_stemmed:"{phrase}"^{boost:.1} OR (document_ngram:"{squashed}")"#)
}

/// Multi-valued Solr fields arrive as one-element arrays.
fn first_value(v: Option<&Value>) -> Option<&Value> {
    match v {
        Some(Value::Array(a)) => a.first(),
        other => other,
    }
}

fn rows_from_docs(docs: &[Value]) -> ResultTable {
    let mut scores: Vec<f32> = docs
        .iter()
        .map(|d| d.get("score").and_then(Value::as_f64).unwrap_or(0.0) as f32)
        .collect();
    normalize_scores(&mut scores);

    docs.iter()
        .zip(scores)
        .enumerate()
        .map(|(i, (d, score))| {
            let metadata = match first_value(d.get("metadata")) {
                Some(Value::String(s)) => serde_json::from_str::<Map<String, Value>>(s)
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "unparseable solr metadata");
                        Map::new()
                    }),
                _ => Map::new(),
            };
            ResultRow {
                id: i as u64 + 1,
                text: first_value(d.get("document"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                doc_id: first_value(d.get("document_id"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                chunk_id: first_value(d.get("chunk_id"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as usize,
                distance: 1.0 - score,
                rerank_score: None,
                metadata,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_boosts_phrase_and_squashes_ngram_term() {
        let q = solr_query("library hours?", 3.0);
        assert_eq!(
            q,
            r#"document_stemmed:"library hours?"^3.0 OR (document_ngram:"libraryhours")"#
        );
    }

    #[test]
    fn docs_unwrap_arrays_and_normalize_scores() {
        let docs = vec![
            json!({
                "id": "u1", "document_id": "d1", "chunk_id": 2,
                "document": ["open nine to five"],
                "metadata": ["{\"url\": \"https://lib.example\"}"],
                "score": 4.0
            }),
            json!({
                "id": "u2", "document_id": "d2", "chunk_id": 0,
                "document": ["closed sundays"], "metadata": ["not json"], "score": 1.0
            }),
        ];
        let t = rows_from_docs(&docs);
        assert_eq!(t.len(), 2);
        assert_eq!(t.rows()[0].text, "open nine to five");
        assert_eq!(t.rows()[0].chunk_id, 2);
        assert_eq!(t.rows()[0].distance, 0.0);
        assert_eq!(t.rows()[0].url(), Some("https://lib.example"));
        assert!((t.rows()[1].distance - 0.75).abs() < 1e-6);
        assert!(t.rows()[1].metadata.is_empty());
    }
}
