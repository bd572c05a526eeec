use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use tracing::info;

use crate::core::app_state::AppState;
use crate::core::detach::detached;
use crate::core::timing::TimingManager;
use crate::error_handler::{AppError, AppResult};
use crate::routes::search::search_request::{SearchRequest, SearchResponse};

/// `POST /search`: nearest rows of one pipeline, unprocessed and unranked.
pub async fn search(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> AppResult<Json<SearchResponse>> {
    let Json(req) = payload?;
    detached(run_search(state, req)).await.map(Json)
}

async fn run_search(state: Arc<AppState>, req: SearchRequest) -> AppResult<SearchResponse> {
    state
        .context
        .config()
        .pipeline(&req.pipeline)
        .map_err(|_| AppError::UnknownPipeline(req.pipeline.clone()))?;

    let mut t = TimingManager::new();
    let results = {
        let wait = std::time::Instant::now();
        let _guard = state.lock.acquire().await?;
        t.record("gpu_lock_wait_time", wait.elapsed());

        let heavy = state.context.heavy(&mut t).await?;
        let stack = heavy.stack(&req.pipeline)?;
        t.time("search_time", stack.search(&req.query)).await?
    };
    info!(pipeline = %req.pipeline, rows = results.len(), "search served");

    Ok(SearchResponse {
        pipeline: req.pipeline,
        query: req.query,
        results,
        timings: t.finalize(),
    })
}
