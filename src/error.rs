//! Error types shared by the relay server and the form client.
//!
//! Relay handlers never let a failure escape as a bare status: every
//! `RelayError` renders as a JSON `{ "error": ... }` envelope through
//! [`RelayReply`]. Client-side submit failures are plain values that the
//! orchestrator surfaces to the user.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

/// Fixed body for a relay without a destination; no configuration detail leaks to clients.
pub const NOT_CONFIGURED_MESSAGE: &str = "Server Error Please Contact Support";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";
pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method not allowed";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("destination webhook URL is not configured")]
    NotConfigured,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("invalid multipart submission: {0}")]
    Multipart(String),
    #[error("upstream request failed: {0}")]
    Transport(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::NotConfigured | RelayError::Multipart(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::Transport(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message placed in the client-visible envelope.
    pub fn public_message(&self) -> String {
        match self {
            RelayError::NotConfigured => NOT_CONFIGURED_MESSAGE.to_string(),
            RelayError::MethodNotAllowed => METHOD_NOT_ALLOWED_MESSAGE.to_string(),
            RelayError::Multipart(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            RelayError::Transport(detail) => detail.clone(),
        }
    }
}

/// Status and JSON body returned to the relay's caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayReply {
    pub status: StatusCode,
    pub body: Value,
}

impl RelayReply {
    pub fn success() -> Self {
        Self {
            status: StatusCode::OK,
            body: json!({ "success": true }),
        }
    }
}

impl From<RelayError> for RelayReply {
    fn from(err: RelayError) -> Self {
        match err.status() {
            s if s.is_server_error() => tracing::error!(error = %err, status = %s, "relay request failed"),
            s => tracing::warn!(error = %err, status = %s, "relay request rejected"),
        }
        RelayReply {
            status: err.status(),
            body: json!({ "error": err.public_message() }),
        }
    }
}

impl IntoResponse for RelayReply {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        RelayReply::from(self).into_response()
    }
}

/// Why a client-side submission did not go through. `Display` is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitFailure {
    /// No response from the relay (connection, timeout, request building).
    #[error("{0}")]
    Transport(String),
    /// The relay answered but did not confirm success.
    #[error("{0}")]
    Upstream(String),
}
