//! Handler error type and its `{ "error": ..., "code": ... }` rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sentinel_core::error::CoreError;
use sentinel_rotation::RotationError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Rotation(#[from] RotationError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(err) => classify_core_error(err),
            AppError::Rotation(err) => classify_rotation_error(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Handler failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    INTERNAL_MESSAGE.to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    let status = match err {
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = match err {
        CoreError::Validation(msg) | CoreError::Unauthorized(msg) => msg.clone(),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            INTERNAL_MESSAGE.to_string()
        }
        other => other.to_string(),
    };

    (status, err.code(), message)
}

/// Reuse always yields the same message regardless of why the token was
/// rejected. Issuer and storage details are logged, not returned.
fn classify_rotation_error(err: &RotationError) -> (StatusCode, &'static str, String) {
    let status = match err {
        RotationError::TokenReuseDetected => StatusCode::UNAUTHORIZED,
        RotationError::InvalidToken(_) | RotationError::Validation(_) => StatusCode::BAD_REQUEST,
        RotationError::DuplicateToken => StatusCode::CONFLICT,
        RotationError::IssuerFailure(_) | RotationError::Storage(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };

    let message = match err {
        RotationError::TokenReuseDetected => {
            "Session is no longer valid. Please sign in again.".to_string()
        }
        RotationError::IssuerFailure(detail) => {
            tracing::warn!(error = %detail, "Rotation failed at the issuer");
            "Unable to issue credentials right now. Retry later.".to_string()
        }
        RotationError::Storage(detail) => {
            tracing::error!(error = %detail, "Rotation failed at the ledger");
            "Session storage is temporarily unavailable. Retry later.".to_string()
        }
        other => other.to_string(),
    };

    (status, err.code(), message)
}
