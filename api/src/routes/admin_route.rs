use std::sync::Arc;

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::core::app_state::AppState;

/// `POST /admin/invalidate`: drop cached stacks and chains; the next request rebuilds.
pub async fn invalidate(State(state): State<Arc<AppState>>) -> Json<Value> {
    let invalidated = state.context.invalidate().await;
    Json(json!({ "invalidated": invalidated }))
}
