//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use quotacard_core::CardError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden - the credential is not eligible for the card.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - wrong status for the requested transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Gone - the card's validity window has passed.
    #[error("gone: {0}")]
    Gone(String),

    /// The credential service failed.
    #[error("credential service error: {0}")]
    BadGateway(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", self.to_string()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "not_eligible", msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "invalid_state", msg.clone()),
            Self::Gone(msg) => (StatusCode::GONE, "card_expired", msg.clone()),
            Self::BadGateway(msg) => (
                StatusCode::BAD_GATEWAY,
                "credential_service_error",
                msg.clone(),
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<CardError> for ApiError {
    fn from(err: CardError) -> Self {
        match err {
            CardError::Validation(msg) => Self::BadRequest(msg),
            CardError::NotFound { .. } => Self::NotFound(err.to_string()),
            CardError::InvalidState { .. } => Self::Conflict(err.to_string()),
            CardError::Expired { .. } => Self::Gone(err.to_string()),
            CardError::NotEligible(msg) => Self::Forbidden(msg),
            CardError::Directory(msg) => Self::BadGateway(msg),
            CardError::Storage(msg) => Self::Internal(msg),
        }
    }
}

impl From<quotacard_store::StoreError> for ApiError {
    fn from(err: quotacard_store::StoreError) -> Self {
        Self::from(CardError::from(err))
    }
}
