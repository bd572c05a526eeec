//! Keyword retrieval complementing dense search.
//!
//! Scores are normalized to `0.0..=1.0` by the best hit and reported as
//! `distance = 1 - score`, so sparse and dense rows sort the same way.

use futures::future::BoxFuture;

use crate::errors::RagError;
use crate::record::{Document, ResultTable};

pub mod keyword;
pub mod solr;

pub use keyword::KeywordIndex;
pub use solr::SolrSparseSearch;

/// Maximum rows a sparse search returns.
pub const SPARSE_ROWS: usize = 10;

pub trait SparseSearch: Send + Sync {
    fn flush_data(&self) -> BoxFuture<'_, Result<(), RagError>>;

    fn index_document<'a>(&'a self, doc: &'a Document) -> BoxFuture<'a, Result<(), RagError>>;

    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<ResultTable, RagError>>;

    fn describe(&self) -> String;
}

/// Divides every score by the maximum; all-zero input stays zero.
pub(crate) fn normalize_scores(scores: &mut [f32]) {
    let max = scores.iter().copied().fold(0.0f32, f32::max);
    if max > 0.0 {
        for s in scores.iter_mut() {
            *s /= max;
        }
    }
}
