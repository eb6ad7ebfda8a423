//! Error types for the session layer.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A handler asked for the session but the middleware is not installed.
    #[error("Session layer not installed")]
    MissingLayer,

    /// Session engine error (store, encoding, reserved keys).
    #[error("Session error: {0}")]
    Session(#[from] satchel_session::Error),

    /// Authentication failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ServerError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        use satchel_session::Error as SessionError;

        match self {
            ServerError::MissingLayer => {
                (StatusCode::INTERNAL_SERVER_ERROR, "missing_session_layer")
            }
            ServerError::Session(SessionError::ReservedKey(_)) => {
                (StatusCode::BAD_REQUEST, "reserved_key")
            }
            ServerError::Session(SessionError::Store(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
            }
            ServerError::Session(_) => (StatusCode::INTERNAL_SERVER_ERROR, "session_error"),
            ServerError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, code, error = %message, "Client error");
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
