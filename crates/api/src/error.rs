use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use slicer_core::error::SliceError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`SliceError`] for job failures and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A job failure from `slicer_core`.
    #[error(transparent)]
    Slice(#[from] SliceError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Slice(err) => classify_slice_error(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a job failure into an HTTP status, error code, and message.
///
/// - Invalid or oversized input maps to 400.
/// - A duplicate job id maps to 409.
/// - Engine and fetch failures map to 500 and keep their (already bounded)
///   diagnostic.
/// - Local I/O failures map to 500 with a sanitized message.
fn classify_slice_error(err: &SliceError) -> (StatusCode, &'static str, String) {
    let status = match err {
        SliceError::Validation(_) | SliceError::PayloadTooLarge { .. } => StatusCode::BAD_REQUEST,
        SliceError::WorkspaceConflict(_) => StatusCode::CONFLICT,
        SliceError::Io(io) => {
            tracing::error!(error = %io, "I/O error during job");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.kind(),
                "An internal error occurred".to_string(),
            );
        }
        SliceError::FetchFailed { .. }
        | SliceError::EngineSpawnFailed { .. }
        | SliceError::EngineExecutionFailed { .. }
        | SliceError::Timeout { .. }
        | SliceError::ArtifactMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.kind(), err.to_string())
}
