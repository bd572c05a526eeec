//! Whole parent documents, rebuilt from the context store.
//!
//! Each retrieved chunk pulls in its full document (chunks in `chunk_id`
//! order, each followed by a newline). Documents that fit are appended whole.
//! The first one that does not fit is cut to a window of the remaining budget
//! centered on the retrieved chunk's midpoint, and assembly stops there: any
//! lower-ranked documents are dropped. With overlapping chunks the rebuilt
//! text repeats the overlaps, so this assembler is meant for overlap-free
//! chunking.

use futures::future::BoxFuture;
use rag_store::{ContextStore, ResultTable};
use serde_json::json;
use tracing::{debug, warn};

use crate::context::{ContextBuilder, ContextBundle, char_slice, truncate_chars};
use crate::error::ContextorError;

#[derive(Clone, Copy, Debug, Default)]
pub struct ParentDocumentAssembler;

impl ContextBuilder for ParentDocumentAssembler {
    fn build_context<'a>(
        &'a self,
        results: &'a ResultTable,
        store: &'a dyn ContextStore,
        size: usize,
    ) -> BoxFuture<'a, Result<ContextBundle, ContextorError>> {
        Box::pin(async move {
            let mut context = String::new();
            let mut context_len = 0usize;
            let mut documents_generated: Vec<String> = Vec::new();

            for row in results {
                let chunks = store.document_chunks(&row.doc_id).await?;
                if chunks.is_empty() {
                    warn!(doc_id = %row.doc_id, "document missing from context store");
                    continue;
                }

                let mut document = String::new();
                let mut doc_len = 0usize;
                let mut middle: Option<f64> = None;
                for (chunk_id, text) in &chunks {
                    let text_len = text.chars().count();
                    if *chunk_id == row.chunk_id {
                        middle = Some(doc_len as f64 + text_len as f64 / 2.0);
                    }
                    document.push_str(text);
                    document.push('\n');
                    doc_len += text_len + 1;
                }
                documents_generated.push(document.clone());

                if doc_len + context_len <= size {
                    context.push_str(&document);
                    context.push('\n');
                    context_len += doc_len + 1;
                    continue;
                }

                let left = size.saturating_sub(context_len) as f64;
                let mid = middle.unwrap_or(doc_len as f64 / 2.0);
                let start = (mid - left / 2.0).max(0.0) as usize;
                let end = (mid + left / 2.0).max(0.0) as usize;
                context.push_str(char_slice(&document, start, end));
                context.push('\n');
                debug!(doc_id = %row.doc_id, start, end, "context budget exhausted");
                break;
            }

            let context = truncate_chars(&context, size).to_string();
            let context_length = context.chars().count();
            debug!(documents = documents_generated.len(), context_length, "parent-document context built");
            let metadata = json!({
                "contextbuilder": {
                    "documents_generated": documents_generated,
                    "context": context,
                    "context_length": context_length,
                }
            });
            Ok(ContextBundle { context, metadata })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_store::{Document, JsonlContextStore, ResultRow};
    use serde_json::Map;

    async fn store_with(docs: &[(&str, &[&str])]) -> (tempfile::TempDir, JsonlContextStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlContextStore::open(dir.path().join("ctx.jsonl")).unwrap();
        for (i, (id, chunks)) in docs.iter().enumerate() {
            let doc = Document {
                id: id.to_string(),
                raw_chunks: chunks.iter().map(|s| s.to_string()).collect(),
                chunks: chunks.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            };
            store.add_contexts(&doc, i == 0).await.unwrap();
        }
        (dir, store)
    }

    fn hit(doc: &str, chunk: usize) -> ResultRow {
        ResultRow {
            id: 1,
            text: String::new(),
            doc_id: doc.into(),
            chunk_id: chunk,
            distance: 0.0,
            rerank_score: None,
            metadata: Map::new(),
        }
    }

    #[tokio::test]
    async fn document_that_fits_is_included_verbatim() {
        let (_d, store) = store_with(&[("a", &["one", "two"])]).await;
        let results = ResultTable::new(vec![hit("a", 1)]);
        let b = ParentDocumentAssembler
            .build_context(&results, &store, 100)
            .await
            .unwrap();
        assert_eq!(b.context, "one\ntwo\n\n");
        assert_eq!(b.metadata["contextbuilder"]["documents_generated"][0], "one\ntwo\n");
    }

    #[tokio::test]
    async fn oversized_document_is_windowed_around_the_hit() {
        // Document: "aaaaaaaaaa\nbbbbbbbbbb\ncccccccccc\n", hit on chunk 1.
        let (_d, store) =
            store_with(&[("a", &["aaaaaaaaaa", "bbbbbbbbbb", "cccccccccc"])]).await;
        let results = ResultTable::new(vec![hit("a", 1)]);
        let b = ParentDocumentAssembler
            .build_context(&results, &store, 10)
            .await
            .unwrap();
        // Midpoint 11 + 5 = 16, window 11..21 is the whole second chunk.
        assert_eq!(b.context, "bbbbbbbbbb");
        assert!(b.context.chars().count() <= 10);
    }

    #[tokio::test]
    async fn lower_ranked_documents_are_dropped_once_budget_runs_out() {
        let (_d, store) = store_with(&[
            ("a", &["first document"]),
            ("b", &["second document is much longer than the rest"]),
            ("c", &["third"]),
        ])
        .await;
        let results = ResultTable::new(vec![hit("a", 0), hit("b", 0), hit("c", 0)]);
        let b = ParentDocumentAssembler
            .build_context(&results, &store, 30)
            .await
            .unwrap();
        assert!(b.context.starts_with("first document\n\n"));
        assert!(!b.context.contains("third"));
        assert_eq!(
            b.metadata["contextbuilder"]["documents_generated"]
                .as_array()
                .unwrap()
                .len(),
            2
        );
        assert!(b.context.chars().count() <= 30);
    }

    #[tokio::test]
    async fn unknown_documents_are_skipped() {
        let (_d, store) = store_with(&[("a", &["x"])]).await;
        let results = ResultTable::new(vec![hit("ghost", 0)]);
        let b = ParentDocumentAssembler
            .build_context(&results, &store, 50)
            .await
            .unwrap();
        assert!(b.is_empty());
    }
}
