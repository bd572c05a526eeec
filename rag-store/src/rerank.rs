//! Second-pass relevance scoring over retrieved rows.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use crate::embed::Encoder;
use crate::errors::RagError;
use crate::record::ResultTable;
use crate::similarity::cosine;

pub trait Reranker: Send + Sync {
    /// Scores every row against `query` and returns the table sorted by that score.
    fn rerank<'a>(
        &'a self,
        query: &'a str,
        table: ResultTable,
    ) -> BoxFuture<'a, Result<ResultTable, RagError>>;

    /// Upper bound on the candidates fetched from the vector store before reranking.
    fn max_raw_results(&self) -> usize;
}

/// Re-encodes query and candidates with the pipeline encoder and scores cosine similarity.
///
/// The score is computed independently of the retrieval distance, so the
/// order can change even when both use the same encoder.
pub struct CosineReranker {
    encoder: Arc<dyn Encoder>,
    max_raw_results: usize,
}

impl CosineReranker {
    pub fn new(encoder: Arc<dyn Encoder>, max_raw_results: usize) -> Self {
        Self {
            encoder,
            max_raw_results: max_raw_results.max(1),
        }
    }
}

impl Reranker for CosineReranker {
    fn rerank<'a>(
        &'a self,
        query: &'a str,
        table: ResultTable,
    ) -> BoxFuture<'a, Result<ResultTable, RagError>> {
        Box::pin(async move {
            if table.is_empty() {
                return Ok(table);
            }
            let q = self.encoder.encode(query).await?;

            let mut rows = table.into_rows();
            for row in rows.iter_mut() {
                let v = self.encoder.encode(&row.text).await?;
                row.rerank_score = Some(cosine(&q, &v));
            }

            let mut out = ResultTable::new(rows);
            out.sort_by_rerank_score();
            debug!(rows = out.len(), "reranked");
            Ok(out)
        })
    }

    fn max_raw_results(&self) -> usize {
        self.max_raw_results
    }
}

/// Leaves the distance order untouched.
pub struct NoopReranker {
    max_raw_results: usize,
}

impl NoopReranker {
    pub fn new(max_raw_results: usize) -> Self {
        Self {
            max_raw_results: max_raw_results.max(1),
        }
    }
}

impl Reranker for NoopReranker {
    fn rerank<'a>(
        &'a self,
        _query: &'a str,
        table: ResultTable,
    ) -> BoxFuture<'a, Result<ResultTable, RagError>> {
        Box::pin(async move { Ok(table) })
    }

    fn max_raw_results(&self) -> usize {
        self.max_raw_results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashingEmbedder;
    use crate::record::row;

    #[tokio::test]
    async fn cosine_reranker_can_reorder_by_text_overlap() {
        let enc: Arc<dyn Encoder> = Arc::new(HashingEmbedder::new(256));
        let rr = CosineReranker::new(enc, 10);
        // Retrieval put the unrelated row first.
        let table = ResultTable::new(vec![
            row("parking permits for students", "a", 0, 0.1),
            row("the library hours are nine to five", "b", 0, 0.4),
        ]);
        let out = rr.rerank("library hours", table).await.unwrap();
        assert_eq!(out.rows()[0].doc_id, "b");
        assert!(out.iter().all(|r| r.rerank_score.is_some()));
    }

    #[tokio::test]
    async fn noop_keeps_order_and_scores_nothing() {
        let rr = NoopReranker::new(0);
        assert_eq!(rr.max_raw_results(), 1);
        let table = ResultTable::new(vec![row("x", "a", 0, 0.1), row("y", "b", 0, 0.2)]);
        let out = rr.rerank("q", table.clone()).await.unwrap();
        assert_eq!(out, table);
    }
}
