use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use abtrack_core::error::CollectError;

/// Application-level errors that map directly to HTTP responses.
///
/// Every variant implements [`IntoResponse`] so Axum handlers can use
/// `Result<impl IntoResponse, AppError>` as their return type.
///
/// Wire shapes:
/// - 400: `{ "error": "<message>" }`
/// - 500: `{ "error": "Internal server error", "message": "<detail>" }`
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<CollectError> for AppError {
    fn from(err: CollectError) -> Self {
        match err {
            CollectError::Validation(_) | CollectError::UnknownAction(_) => {
                AppError::BadRequest(err.to_string())
            }
            CollectError::Store(e) => AppError::Internal(e),
            CollectError::TimeOutOfRange(message) => AppError::Internal(anyhow::anyhow!(message)),
            // Unparseable bodies are reported as server faults, matching the
            // long-standing contract of this endpoint.
            CollectError::MalformedInput(e) => AppError::Internal(e.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error",
                        "message": e.to_string(),
                    })),
                )
                    .into_response()
            }
        }
    }
}
