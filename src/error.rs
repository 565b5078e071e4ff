//! Application-level errors and their JSON responses.
//!
//! Probe failures are never errors at this level: they are reported as
//! result data with `ok: false`. The only hard failure a client can cause
//! is asking for an endpoint that is not configured.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("no endpoint configured for path: {0}")]
    UnknownEndpoint(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::UnknownEndpoint(path) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": "Not Found", "path": path }),
            ),
            AppError::Internal(_) => {
                tracing::error!("Internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": "Internal Server Error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
