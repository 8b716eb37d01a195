//! Error types for the dispatch API server.
//!
//! [`ApiError`] unifies all failure modes into a single enum that converts
//! into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. The body
//! is always `{"error", "code", "status"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rescue_core::{DispatchError, ErrorKind};

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A core operation failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// No usable identity on the request.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The identity may not perform this operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// An identifier in the path could not be parsed.
    #[error("invalid id: {0}")]
    InvalidId(String),

    /// An invalid query parameter was provided.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status and stable machine-readable code.
    pub const fn status(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Dispatch(err) => match err.kind() {
                ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                ErrorKind::Conflict => (StatusCode::CONFLICT, "CONFLICT"),
                ErrorKind::InvalidTransition => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_TRANSITION")
                }
                ErrorKind::TerminalState => (StatusCode::UNPROCESSABLE_ENTITY, "TERMINAL_STATE"),
                ErrorKind::InvalidInput => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            },
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::InvalidId(_) | Self::InvalidQuery(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "code": code,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
