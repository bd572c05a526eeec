//! HTTP surface: routes, the per-query coordinator and process state.

pub mod core;
pub mod error_handler;
pub mod routes;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use contextor::cfg::env;
use tokio::signal;
use tracing::{info, warn};

use crate::core::app_state::AppState;
use crate::core::timing::TimingManager;
use crate::error_handler::AppError;
use crate::routes::{
    admin_route::invalidate, health_route::health, query::query_route::query,
    raw_query_route::raw_query, search::search_route::search,
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/query/v1", post(query))
        .route("/query/raw", post(raw_query))
        .route("/search", post(search))
        .route("/admin/invalidate", post(invalidate))
        .with_state(state)
}

/// Serves on `API_ADDRESS` (default `127.0.0.1:8080`) until Ctrl+C.
pub async fn start() -> Result<(), AppError> {
    let state = Arc::new(AppState::from_env().await?);
    serve(state).await
}

pub async fn serve(state: Arc<AppState>) -> Result<(), AppError> {
    let addr = env("API_ADDRESS", "127.0.0.1:8080");

    // Exclusive mode owns the device for the process lifetime: build up front.
    if state.exclusive_mode() {
        let mut timings = TimingManager::new();
        state.context.heavy(&mut timings).await?;
        info!(build_secs = timings.get("rag_stack_build_time").unwrap_or_default(), "stacks warmed");
    }

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(AppError::Bind)?;
    info!(%addr, exclusive = state.exclusive_mode(), "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => warn!(error = %e, "cannot listen for Ctrl+C; serving until killed"),
    }
}
