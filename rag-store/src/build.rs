//! Offline build pipelines: document stores for RAG, question store for QA.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use services::uuid::gen_uuid;
use tracing::{debug, info, warn};

use crate::chunker::Chunker;
use crate::collect::Collector;
use crate::context_store::ContextStore;
use crate::embed::Encoder;
use crate::embed_pool::encode_all;
use crate::errors::RagError;
use crate::progress::Progress;
use crate::record::Document;
use crate::sparse::SparseSearch;
use crate::vector::VectorStore;

/// Counts for one build run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub processed: usize,
    pub ignored: usize,
    pub chunks: usize,
}

/* ---------------------------------- RAG ----------------------------------- */

pub struct RagBuilder {
    pub encoder: Arc<dyn Encoder>,
    pub vectors: Arc<dyn VectorStore>,
    pub contexts: Arc<dyn ContextStore>,
    pub sparse: Option<Arc<dyn SparseSearch>>,
    pub chunker: Arc<dyn Chunker>,
    pub collectors: Vec<Box<dyn Collector>>,
    /// Encoder requests in flight per document.
    pub concurrency: usize,
}

impl RagBuilder {
    /// Rebuilds every store from scratch.
    ///
    /// The first stored document recreates the tables; embedding ids keep
    /// counting across collectors.
    pub async fn build(&self, progress: &dyn Progress) -> Result<BuildReport, RagError> {
        self.vectors.flush_data().await?;
        self.contexts.flush_data().await?;
        if let Some(sparse) = &self.sparse {
            sparse.flush_data().await?;
        }

        let mut report = BuildReport::default();
        let mut first_item = true;
        let mut embedding_id = 0u64;

        for collector in &self.collectors {
            let total = collector.len();
            info!(collector = collector.name(), total, "processing collector");
            if collector.is_empty() {
                warn!(collector = collector.name(), "collector provided no items");
                continue;
            }
            progress.set_total(total as u64);

            for (n, item) in collector.items()?.into_iter().enumerate() {
                progress.step(collector.name());
                let Some(content) = item.content else {
                    warn!(item = n, "item has no content, skipping");
                    report.ignored += 1;
                    continue;
                };
                if collector.ignore_item(&content) {
                    debug!(item = n, "item ignored by collector");
                    report.ignored += 1;
                    continue;
                }

                let chunked = self.chunker.generate(&content, item.metadata);
                if chunked.chunks.is_empty() {
                    report.ignored += 1;
                    continue;
                }
                report.processed += 1;

                let embeddings =
                    encode_all(self.encoder.as_ref(), &chunked.chunks, self.concurrency).await?;
                let doc = Document {
                    id: gen_uuid(),
                    raw_chunks: chunked.raw_chunks,
                    chunks: chunked.chunks,
                    embeddings,
                    metadata: chunked.metadata,
                };
                report.chunks += doc.chunks.len();

                embedding_id = self
                    .vectors
                    .add_embeddings(&doc, embedding_id, first_item)
                    .await?;
                self.contexts.add_contexts(&doc, first_item).await?;
                if let Some(sparse) = &self.sparse {
                    sparse.index_document(&doc).await?;
                }
                first_item = false;
                debug!(doc_id = %doc.id, chunks = doc.chunks.len(), last_id = embedding_id, "document stored");
            }
        }

        progress.finish("build complete");
        info!(
            processed = report.processed,
            ignored = report.ignored,
            chunks = report.chunks,
            "rag build complete"
        );
        Ok(report)
    }
}

/* ----------------------------------- QA ----------------------------------- */

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QaLinkSpec {
    pub label: String,
    pub url: String,
}

/// A curated answer reachable through several phrasings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QaEntry {
    pub queries: Vec<String>,
    pub response: String,
    #[serde(default)]
    pub links: Vec<QaLinkSpec>,
}

pub struct QaBuilder {
    pub encoder: Arc<dyn Encoder>,
    pub store: Arc<dyn VectorStore>,
    pub questions: Vec<QaEntry>,
}

impl QaBuilder {
    /// Stores one single-chunk document per phrasing. The row metadata
    /// carries `{question, response, links}`.
    pub async fn build(&self, progress: &dyn Progress) -> Result<BuildReport, RagError> {
        self.store.flush_data().await?;

        let total: usize = self.questions.iter().map(|q| q.queries.len()).sum();
        progress.set_total(total as u64);

        let mut report = BuildReport::default();
        let mut first = true;
        let mut id = 0u64;
        for entry in &self.questions {
            for query in &entry.queries {
                progress.step(query);
                if query.trim().is_empty() {
                    report.ignored += 1;
                    continue;
                }
                let vector = self.encoder.encode(query).await?;
                let doc = Document {
                    id: gen_uuid(),
                    raw_chunks: vec![query.clone()],
                    chunks: vec![query.clone()],
                    embeddings: vec![vector],
                    metadata: qa_metadata(query, entry),
                };
                id = self.store.add_embeddings(&doc, id, first).await?;
                first = false;
                report.processed += 1;
                report.chunks += 1;
            }
        }

        progress.finish("qa build complete");
        info!(questions = report.processed, "qa build complete");
        Ok(report)
    }
}

fn qa_metadata(question: &str, entry: &QaEntry) -> Map<String, Value> {
    let v = json!({
        "question": question,
        "response": entry.response,
        "links": entry.links,
    });
    v.as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{CharacterChunker, ChunkerConfig};
    use crate::collect::{CollectedItem, Collector};
    use crate::config::DistanceKind;
    use crate::context_store::JsonlContextStore;
    use crate::embed::HashingEmbedder;
    use crate::progress::NoopProgress;
    use crate::sparse::KeywordIndex;
    use crate::vector::JsonlVectorStore;

    struct Fixed(Vec<CollectedItem>);

    impl Collector for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn len(&self) -> usize {
            self.0.len()
        }
        fn items(&self) -> Result<Vec<CollectedItem>, RagError> {
            Ok(self.0.clone())
        }
    }

    fn item(content: Option<&str>) -> CollectedItem {
        CollectedItem {
            content: content.map(str::to_string),
            metadata: Map::new(),
        }
    }

    #[tokio::test]
    async fn build_skips_empty_items_and_continues_ids_across_collectors() {
        let dir = tempfile::tempdir().unwrap();
        let encoder: Arc<dyn Encoder> = Arc::new(HashingEmbedder::new(32));
        let vectors =
            Arc::new(JsonlVectorStore::open(dir.path().join("v.jsonl"), DistanceKind::Cosine).unwrap());
        let contexts = Arc::new(JsonlContextStore::open(dir.path().join("c.jsonl")).unwrap());
        let sparse = Arc::new(KeywordIndex::open(dir.path().join("k.jsonl")).unwrap());
        let chunker = CharacterChunker::new(ChunkerConfig {
            split_on: "\n\n".into(),
            chunk_size: 20,
            overlap: 0,
            add_document_metadata: false,
        })
        .unwrap();

        let builder = RagBuilder {
            encoder: encoder.clone(),
            vectors: vectors.clone(),
            contexts: contexts.clone(),
            sparse: Some(sparse.clone()),
            chunker: Arc::new(chunker),
            collectors: vec![
                Box::new(Fixed(vec![
                    item(Some("library hours\n\nnine to five")),
                    item(None),
                    item(Some("   ")),
                ])),
                Box::new(Fixed(vec![])),
                Box::new(Fixed(vec![item(Some("parking lot b"))])),
            ],
            concurrency: 2,
        };

        let report = builder.build(&NoopProgress).await.unwrap();
        assert_eq!(
            report,
            BuildReport {
                processed: 2,
                ignored: 2,
                chunks: 3
            }
        );
        assert_eq!(vectors.len().await, 3);

        let q = encoder.encode("parking lot b").await.unwrap();
        let hit = vectors.query(&q, 1, 2.0).await.unwrap();
        assert_eq!(hit.rows()[0].id, 3);
        assert_eq!(sparse.search("parking").await.unwrap().len(), 1);
        let chunks = contexts.document_chunks(&hit.rows()[0].doc_id).await.unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn qa_build_stores_each_phrasing_with_response() {
        let dir = tempfile::tempdir().unwrap();
        let encoder: Arc<dyn Encoder> = Arc::new(HashingEmbedder::new(64));
        let store =
            Arc::new(JsonlVectorStore::open(dir.path().join("qa.jsonl"), DistanceKind::Cosine).unwrap());
        let builder = QaBuilder {
            encoder: encoder.clone(),
            store: store.clone(),
            questions: vec![QaEntry {
                queries: vec!["library hours".into(), "when is the library open".into()],
                response: "9-5".into(),
                links: vec![QaLinkSpec {
                    label: "Hours".into(),
                    url: "https://lib.example/hours".into(),
                }],
            }],
        };
        let report = builder.build(&NoopProgress).await.unwrap();
        assert_eq!(report.processed, 2);

        let q = encoder.encode("library hours").await.unwrap();
        let t = store.query(&q, 1, 0.1).await.unwrap();
        assert_eq!(t.rows()[0].metadata["response"], "9-5");
        assert_eq!(t.rows()[0].metadata["links"][0]["url"], "https://lib.example/hours");
    }
}
