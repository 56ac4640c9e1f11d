//! Error responses for the HTTP API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::persistence::StateError;
use crate::worker::WorkerError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// First event for a work root without an issue to work on.
    #[error("repo and issue_number are required for start.")]
    MissingContext,

    #[error("no worker state yet")]
    StateNotFound,

    #[error("failed to read worker state: {0}")]
    State(#[from] StateError),

    #[error("{0}")]
    Worker(#[from] WorkerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MissingContext => StatusCode::BAD_REQUEST,
            ApiError::StateNotFound => StatusCode::NOT_FOUND,
            ApiError::State(_) | ApiError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}
