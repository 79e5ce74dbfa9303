//! Relay error types with HTTP status code mapping.
//!
//! [`RelayError`] is the central error type for the relay. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! The same taxonomy is reused on the WebSocket channel, where the numeric
//! code is embedded in an error frame instead of a status line.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2002,
///     "message": "forbidden: not a member of this room",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`RelayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category       | HTTP Status               |
/// |-----------|----------------|---------------------------|
/// | 1000–1999 | Validation     | 400 Bad Request           |
/// | 2000–2999 | Authentication | 401 / 403                 |
/// | 3000–3999 | Not Found      | 404 Not Found             |
/// | 4000–4999 | Storage        | 500 Internal Server Error |
/// | 5000–5999 | Internal       | 500 Internal Server Error |
///
/// `Unauthenticated` is connection-terminal: the WebSocket layer closes the
/// connection without sending an error payload. `Forbidden` and `NotFound`
/// are operation-level and reported back on the channel the request arrived
/// on, never broadcast. `InvariantViolation` reflects an internal bookkeeping
/// bug; it is logged and clamped, never propagated to clients.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Request validation failed (empty content, malformed payload, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or invalid bearer credential.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated identity is not allowed to act on the target.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Target entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Persistence collaborator failure. No automatic retry is attempted;
    /// the caller is responsible for resubmission.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Internal bookkeeping inconsistency (e.g. negative presence count).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Unauthenticated(_) => 2001,
            Self::Forbidden(_) => 2002,
            Self::NotFound(_) => 3001,
            Self::StorageError(_) => 4001,
            Self::InvariantViolation(_) => 5001,
            Self::Internal(_) => 5000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::StorageError(_) | Self::InvariantViolation(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
