//! `POST /query/raw`: answer from a caller-supplied context, no retrieval.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use llm_chains::ChainInputs;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::app_state::AppState;
use crate::core::detach::detached;
use crate::core::timing::{TimingManager, Timings};
use crate::error_handler::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct RawQueryRequest {
    pub context: String,
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct RawQueryResponse {
    pub response: String,
    pub timings: Timings,
}

pub async fn raw_query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RawQueryRequest>, JsonRejection>,
) -> AppResult<Json<RawQueryResponse>> {
    let Json(req) = payload?;
    detached(answer(state, req)).await.map(Json)
}

async fn answer(state: Arc<AppState>, req: RawQueryRequest) -> AppResult<RawQueryResponse> {
    if req.query.trim().is_empty() {
        return Err(AppError::BadRequest("query must not be empty".into()));
    }

    let mut t = TimingManager::new();
    let response = {
        let wait = Instant::now();
        let _guard = state.lock.acquire().await?;
        t.record("gpu_lock_wait_time", wait.elapsed());

        let heavy = state.context.heavy(&mut t).await?;
        let inputs = ChainInputs::new()
            .with("context", req.context.as_str())
            .with("query", req.query.as_str());
        t.time("inference_time", heavy.chains.context_plus.invoke(&inputs))
            .await?
    };
    info!(response_len = response.len(), "raw query answered");

    Ok(RawQueryResponse {
        response: response.trim().to_string(),
        timings: t.finalize(),
    })
}
