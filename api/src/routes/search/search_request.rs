use rag_store::ResultTable;
use serde::{Deserialize, Serialize};

use crate::core::timing::Timings;

/// Body of `POST /search`.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub pipeline: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub pipeline: String,
    pub query: String,
    pub results: ResultTable,
    pub timings: Timings,
}
