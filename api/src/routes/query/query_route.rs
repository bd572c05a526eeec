use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::core::app_state::AppState;
use crate::core::coordinator::run_query;
use crate::core::detach::detached;
use crate::error_handler::AppResult;
use crate::routes::query::query_request::QueryRequest;

/// `POST /query/v1`: the full pipeline. A failed stage still returns the
/// response body, with status 500. The query keeps running if the client
/// disconnects.
pub async fn query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(req) = payload?;
    let resp = detached(async move {
        run_query(&state, &req.query, &req.pipeline, req.client).await
    })
    .await?;
    let status = if resp.failed() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    Ok((status, Json(resp)).into_response())
}
