//! Chunk text by document, used to reassemble parent documents at query time.

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::RagError;
use crate::io_jsonl;
use crate::record::Document;

pub trait ContextStore: Send + Sync {
    fn flush_data(&self) -> BoxFuture<'_, Result<(), RagError>>;

    /// Stores every raw chunk of `doc`. `create_table` replaces existing contents.
    fn add_contexts<'a>(
        &'a self,
        doc: &'a Document,
        create_table: bool,
    ) -> BoxFuture<'a, Result<(), RagError>>;

    /// `(chunk_id, text)` pairs of one document, ordered by `chunk_id`.
    fn document_chunks<'a>(
        &'a self,
        doc_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<(usize, String)>, RagError>>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ContextRow {
    doc_id: String,
    chunk_id: usize,
    text: String,
}

pub struct JsonlContextStore {
    path: PathBuf,
    rows: RwLock<Vec<ContextRow>>,
}

impl JsonlContextStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RagError> {
        let path = path.as_ref().to_path_buf();
        let rows: Vec<ContextRow> = io_jsonl::read_all(&path)?;
        info!(path = %path.display(), rows = rows.len(), "context store opened");
        Ok(Self {
            path,
            rows: RwLock::new(rows),
        })
    }
}

impl ContextStore for JsonlContextStore {
    fn flush_data(&self) -> BoxFuture<'_, Result<(), RagError>> {
        Box::pin(async move {
            self.rows.write().await.clear();
            io_jsonl::remove(&self.path)?;
            info!(path = %self.path.display(), "context store flushed");
            Ok(())
        })
    }

    fn add_contexts<'a>(
        &'a self,
        doc: &'a Document,
        create_table: bool,
    ) -> BoxFuture<'a, Result<(), RagError>> {
        Box::pin(async move {
            let new_rows: Vec<ContextRow> = doc
                .raw_chunks
                .iter()
                .enumerate()
                .map(|(chunk_id, text)| ContextRow {
                    doc_id: doc.id.clone(),
                    chunk_id,
                    text: text.clone(),
                })
                .collect();

            let mut rows = self.rows.write().await;
            if create_table {
                io_jsonl::write_all(&self.path, &new_rows)?;
                *rows = new_rows;
            } else {
                io_jsonl::append_all(&self.path, &new_rows)?;
                rows.extend(new_rows);
            }
            debug!(doc_id = %doc.id, chunks = doc.raw_chunks.len(), "contexts stored");
            Ok(())
        })
    }

    fn document_chunks<'a>(
        &'a self,
        doc_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<(usize, String)>, RagError>> {
        Box::pin(async move {
            let rows = self.rows.read().await;
            let mut out: Vec<(usize, String)> = rows
                .iter()
                .filter(|r| r.doc_id == doc_id)
                .map(|r| (r.chunk_id, r.text.clone()))
                .collect();
            out.sort_by_key(|(id, _)| *id);
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, chunks: &[&str]) -> Document {
        Document {
            id: id.into(),
            raw_chunks: chunks.iter().map(|s| s.to_string()).collect(),
            chunks: chunks.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn chunks_come_back_in_order_per_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctx.jsonl");
        let store = JsonlContextStore::open(&path).unwrap();
        store.add_contexts(&doc("a", &["a0", "a1"]), true).await.unwrap();
        store.add_contexts(&doc("b", &["b0"]), false).await.unwrap();

        let reopened = JsonlContextStore::open(&path).unwrap();
        let a = reopened.document_chunks("a").await.unwrap();
        assert_eq!(a, vec![(0, "a0".to_string()), (1, "a1".to_string())]);
        assert!(reopened.document_chunks("zzz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_table_replaces_previous_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlContextStore::open(dir.path().join("ctx.jsonl")).unwrap();
        store.add_contexts(&doc("a", &["old"]), true).await.unwrap();
        store.add_contexts(&doc("b", &["new"]), true).await.unwrap();
        assert!(store.document_chunks("a").await.unwrap().is_empty());
        store.flush_data().await.unwrap();
        assert!(store.document_chunks("b").await.unwrap().is_empty());
    }
}
