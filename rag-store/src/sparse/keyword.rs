//! In-process BM25 keyword index (k1 = 1.2, b = 0.75), persisted as JSONL.
//!
//! Only chunk text is persisted; term statistics are rebuilt on open.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::embed::hashing::tokens;
use crate::errors::RagError;
use crate::io_jsonl;
use crate::record::{Document, ResultRow, ResultTable};
use crate::sparse::{SPARSE_ROWS, SparseSearch, normalize_scores};

const K1: f32 = 1.2;
const B: f32 = 0.75;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct IndexedChunk {
    doc_id: String,
    chunk_id: usize,
    text: String,
    #[serde(default)]
    metadata: Map<String, Value>,
}

#[derive(Default)]
struct Inner {
    chunks: Vec<IndexedChunk>,
    term_freqs: Vec<HashMap<String, u32>>,
    lengths: Vec<usize>,
    doc_freq: HashMap<String, usize>,
    total_len: usize,
}

impl Inner {
    fn push(&mut self, chunk: IndexedChunk) {
        let mut tf: HashMap<String, u32> = HashMap::new();
        let mut len = 0;
        for t in tokens(&chunk.text) {
            *tf.entry(t).or_default() += 1;
            len += 1;
        }
        for term in tf.keys() {
            *self.doc_freq.entry(term.clone()).or_default() += 1;
        }
        self.total_len += len;
        self.lengths.push(len);
        self.term_freqs.push(tf);
        self.chunks.push(chunk);
    }

    fn score(&self, query_terms: &HashSet<String>) -> Vec<(usize, f32)> {
        let n = self.chunks.len();
        if n == 0 {
            return Vec::new();
        }
        let avgdl = (self.total_len as f32 / n as f32).max(1.0);

        let mut out = Vec::new();
        for (i, tf) in self.term_freqs.iter().enumerate() {
            let dl = self.lengths[i] as f32;
            let mut s = 0.0f32;
            for term in query_terms {
                let Some(&f) = tf.get(term) else { continue };
                let df = self.doc_freq.get(term).copied().unwrap_or(0) as f32;
                let idf = ((n as f32 - df + 0.5) / (df + 0.5) + 1.0).ln();
                let f = f as f32;
                s += idf * f * (K1 + 1.0) / (f + K1 * (1.0 - B + B * dl / avgdl));
            }
            if s > 0.0 {
                out.push((i, s));
            }
        }
        out.sort_by(|a, b| b.1.total_cmp(&a.1));
        out
    }
}

pub struct KeywordIndex {
    path: PathBuf,
    inner: RwLock<Inner>,
}

impl KeywordIndex {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RagError> {
        let path = path.as_ref().to_path_buf();
        let rows: Vec<IndexedChunk> = io_jsonl::read_all(&path)?;
        let mut inner = Inner::default();
        for r in rows {
            inner.push(r);
        }
        info!(path = %path.display(), chunks = inner.chunks.len(), "keyword index opened");
        Ok(Self {
            path,
            inner: RwLock::new(inner),
        })
    }
}

impl SparseSearch for KeywordIndex {
    fn flush_data(&self) -> BoxFuture<'_, Result<(), RagError>> {
        Box::pin(async move {
            *self.inner.write().await = Inner::default();
            io_jsonl::remove(&self.path)?;
            info!(path = %self.path.display(), "keyword index flushed");
            Ok(())
        })
    }

    fn index_document<'a>(&'a self, doc: &'a Document) -> BoxFuture<'a, Result<(), RagError>> {
        Box::pin(async move {
            let rows: Vec<IndexedChunk> = doc
                .raw_chunks
                .iter()
                .enumerate()
                .map(|(chunk_id, text)| IndexedChunk {
                    doc_id: doc.id.clone(),
                    chunk_id,
                    text: text.clone(),
                    metadata: doc.metadata.clone(),
                })
                .collect();

            let mut inner = self.inner.write().await;
            io_jsonl::append_all(&self.path, &rows)?;
            for r in rows {
                inner.push(r);
            }
            debug!(doc_id = %doc.id, chunks = doc.raw_chunks.len(), "document indexed");
            Ok(())
        })
    }

    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<ResultTable, RagError>> {
        Box::pin(async move {
            let terms: HashSet<String> = tokens(query).collect();
            let inner = self.inner.read().await;
            let mut hits = inner.score(&terms);
            hits.truncate(SPARSE_ROWS);

            let mut scores: Vec<f32> = hits.iter().map(|(_, s)| *s).collect();
            normalize_scores(&mut scores);

            let rows = hits
                .iter()
                .zip(scores)
                .map(|((i, _), score)| {
                    let c = &inner.chunks[*i];
                    ResultRow {
                        id: *i as u64 + 1,
                        text: c.text.clone(),
                        doc_id: c.doc_id.clone(),
                        chunk_id: c.chunk_id,
                        distance: 1.0 - score,
                        rerank_score: None,
                        metadata: c.metadata.clone(),
                    }
                })
                .collect::<ResultTable>();
            debug!(terms = terms.len(), returned = rows.len(), "keyword search");
            Ok(rows)
        })
    }

    fn describe(&self) -> String {
        format!("keyword:{}", self.path.display())
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
    async fn rare_terms_rank_first_and_scores_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let idx = KeywordIndex::open(dir.path().join("kw.jsonl")).unwrap();
        idx.index_document(&doc("a", &["the library opens at nine", "the cafe opens at eight"]))
            .await
            .unwrap();
        idx.index_document(&doc("b", &["parking is behind the gym"]))
            .await
            .unwrap();

        let t = idx.search("When does the library open?").await.unwrap();
        assert_eq!(t.rows()[0].doc_id, "a");
        assert_eq!(t.rows()[0].chunk_id, 0);
        assert!(t.rows()[0].distance.abs() < 1e-6);
        assert!(t.iter().all(|r| (0.0..=1.0).contains(&r.distance)));
    }

    #[tokio::test]
    async fn no_shared_terms_means_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let idx = KeywordIndex::open(dir.path().join("kw.jsonl")).unwrap();
        idx.index_document(&doc("a", &["alpha beta"])).await.unwrap();
        assert!(idx.search("gamma").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn index_survives_reopen_and_flush_clears_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kw.jsonl");
        {
            let idx = KeywordIndex::open(&path).unwrap();
            idx.index_document(&doc("a", &["solar panels"])).await.unwrap();
        }
        let idx = KeywordIndex::open(&path).unwrap();
        assert_eq!(idx.search("solar").await.unwrap().len(), 1);
        idx.flush_data().await.unwrap();
        assert!(idx.search("solar").await.unwrap().is_empty());
    }
}
