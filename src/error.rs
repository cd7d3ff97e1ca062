//! Domain error types.
//!
//! Defines `AppError`, the single error taxonomy every core operation returns.
//! Implements Axum's `IntoResponse` so handlers can return it directly with a
//! JSON `{"error": ...}` body.
//!
//! Error mappings:
//! - `NotFound` (repository, file, SSH key, secret) → 404
//! - `PathEscape`, `InvalidArgument`, `Engine` → 400
//! - `Transport` (network or authentication during clone/push/fetch) → 502
//! - `ToolUnavailable` (git or git-lfs missing) → 503
//! - `Io`, `Internal` → 500

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Path escapes repository root: {0}")]
    PathEscape(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Git error: {0}")]
    Engine(String),

    #[error("Tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<git2::Error> for AppError {
    fn from(err: git2::Error) -> Self {
        AppError::Engine(err.message().to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PathEscape(_) | AppError::InvalidArgument(_) | AppError::Engine(_) => StatusCode::BAD_REQUEST,
            AppError::Transport(_) => StatusCode::BAD_GATEWAY,
            AppError::ToolUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Io(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

impl AppError {
    pub fn lock_poisoned() -> Self {
        AppError::Internal("Lock poisoned".to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
