use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use vidblur_common::error::VidblurError;
use vidblur_processing::ProcessingError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`ProcessingError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce `{ "error", "code" }` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    /// A request body that failed to deserialize.
    #[error(transparent)]
    InvalidBody(#[from] JsonRejection),

    #[error(transparent)]
    InvalidQuery(#[from] QueryRejection),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Processing(err) => classify_processing_error(err),

            AppError::InvalidBody(rejection) => {
                (rejection.status(), "INVALID_BODY", rejection.body_text())
            }
            AppError::InvalidQuery(rejection) => {
                (rejection.status(), "INVALID_QUERY", rejection.body_text())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
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

/// Map a pipeline error to an HTTP status, error code, and message.
fn classify_processing_error(err: &ProcessingError) -> (StatusCode, &'static str, String) {
    match err {
        ProcessingError::VideoNotFound { .. } => {
            (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
        }
        ProcessingError::AlreadyProcessing { .. } | ProcessingError::Transition { .. } => {
            (StatusCode::CONFLICT, "CONFLICT", err.to_string())
        }
        ProcessingError::InvalidMasks { message } => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message.clone())
        }
        ProcessingError::InvalidOutput { .. } => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string())
        }
        ProcessingError::Render(VidblurError::FileNotFound { .. }) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Source video file is missing".to_string(),
        ),
        ProcessingError::Library(_)
        | ProcessingError::Render(_)
        | ProcessingError::TaskFailed { .. } => {
            tracing::error!(error = %err, "Processing error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
