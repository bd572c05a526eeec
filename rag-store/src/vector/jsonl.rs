//! File-backed vector store with brute-force search.
//!
//! All rows live in memory behind an `RwLock`; every write is mirrored to a
//! JSONL file so the store survives restarts.

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::DistanceKind;
use crate::errors::RagError;
use crate::io_jsonl;
use crate::record::{Document, ResultRow, ResultTable};
use crate::vector::VectorStore;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredVector {
    id: u64,
    doc_id: String,
    chunk_id: usize,
    text: String,
    vector: Vec<f32>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

pub struct JsonlVectorStore {
    path: PathBuf,
    distance: DistanceKind,
    rows: RwLock<Vec<StoredVector>>,
}

impl JsonlVectorStore {
    /// Opens (or lazily creates) the store at `path`.
    pub fn open(path: impl AsRef<Path>, distance: DistanceKind) -> Result<Self, RagError> {
        let path = path.as_ref().to_path_buf();
        let rows: Vec<StoredVector> = io_jsonl::read_all(&path)?;
        info!(path = %path.display(), rows = rows.len(), ?distance, "vector store opened");
        Ok(Self {
            path,
            distance,
            rows: RwLock::new(rows),
        })
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }
}

impl VectorStore for JsonlVectorStore {
    fn flush_data(&self) -> BoxFuture<'_, Result<(), RagError>> {
        Box::pin(async move {
            let mut rows = self.rows.write().await;
            rows.clear();
            io_jsonl::remove(&self.path)?;
            info!(path = %self.path.display(), "vector store flushed");
            Ok(())
        })
    }

    fn add_embeddings<'a>(
        &'a self,
        doc: &'a Document,
        start_id: u64,
        create_table: bool,
    ) -> BoxFuture<'a, Result<u64, RagError>> {
        Box::pin(async move {
            doc.check_consistent()?;

            let mut id = start_id;
            let mut new_rows = Vec::with_capacity(doc.embeddings.len());
            for (chunk_id, vector) in doc.embeddings.iter().enumerate() {
                id += 1;
                new_rows.push(StoredVector {
                    id,
                    doc_id: doc.id.clone(),
                    chunk_id,
                    text: doc.raw_chunks[chunk_id].clone(),
                    vector: vector.clone(),
                    metadata: doc.metadata.clone(),
                });
            }

            let mut rows = self.rows.write().await;
            if create_table {
                io_jsonl::write_all(&self.path, &new_rows)?;
                *rows = new_rows;
            } else {
                io_jsonl::append_all(&self.path, &new_rows)?;
                rows.extend(new_rows);
            }
            debug!(doc_id = %doc.id, last_id = id, create_table, "embeddings stored");
            Ok(id)
        })
    }

    fn query<'a>(
        &'a self,
        vector: &'a [f32],
        limit: usize,
        max_distance: f32,
    ) -> BoxFuture<'a, Result<ResultTable, RagError>> {
        Box::pin(async move {
            let rows = self.rows.read().await;
            let mut hits = Vec::new();
            for r in rows.iter() {
                if r.vector.len() != vector.len() {
                    return Err(RagError::VectorSizeMismatch {
                        got: vector.len(),
                        want: r.vector.len(),
                    });
                }
                let distance = self.distance.distance(vector, &r.vector);
                if distance <= max_distance {
                    hits.push(ResultRow {
                        id: r.id,
                        text: r.text.clone(),
                        doc_id: r.doc_id.clone(),
                        chunk_id: r.chunk_id,
                        distance,
                        rerank_score: None,
                        metadata: r.metadata.clone(),
                    });
                }
            }

            let mut table = ResultTable::new(hits);
            table.sort_by_distance();
            table.truncate(limit);
            debug!(returned = table.len(), limit, max_distance, "vector query");
            Ok(table)
        })
    }

    fn describe(&self) -> String {
        format!("jsonl:{}", self.path.display())
    }
}
