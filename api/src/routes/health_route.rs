use std::sync::Arc;

use ai_llm_service::HealthStatus;
use axum::{Json, extract::State};
use serde::Serialize;

use crate::core::app_state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub exclusive_mode: bool,
    pub pipelines: Vec<String>,
    /// Reachability of the configured model endpoints; empty when offline.
    pub llm: Vec<HealthStatus>,
}

/// `GET /health`. Answers without taking the compute lock.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let llm = match &state.llm {
        Some(profiles) => profiles.health_all().await,
        None => Vec::new(),
    };
    Json(HealthResponse {
        status: "healthy",
        message: "Service is running",
        exclusive_mode: state.exclusive_mode(),
        pipelines: state.context.config().pipeline_names(),
        llm,
    })
}
