use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use contextor::ContextorError;
use llm_chains::ChainError;
use serde::Serialize;
use thiserror::Error;

use crate::core::lock::LockError;

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // --- Boot / config ---
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Request ---
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unknown pipeline: {0}")]
    UnknownPipeline(String),

    // --- Lower layers ---
    #[error(transparent)]
    Contextor(#[from] ContextorError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("request task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::UnknownPipeline(_) => StatusCode::BAD_REQUEST,
            AppError::Contextor(ContextorError::UnknownPipeline(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Bind(_) => "BIND_ERROR",
            AppError::Server(_) => "SERVER_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::UnknownPipeline(_) | AppError::Contextor(ContextorError::UnknownPipeline(_)) => {
                "UNKNOWN_PIPELINE"
            }
            AppError::Contextor(_) => "PIPELINE_ERROR",
            AppError::Chain(_) => "LLM_ERROR",
            AppError::Lock(_) => "LOCK_ERROR",
            AppError::Task(_) => "TASK_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Json(_) => "JSON_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.error_code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Handy result alias used across handlers.
pub type AppResult<T> = Result<T, AppError>;

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest(err.body_text())
    }
}
