//! Error types for the hub.
//!
//! [`HubError`] covers both server lifecycle failures and HTTP handler
//! failures; the latter convert into a JSON response through
//! [`IntoResponse`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::auth::AuthError;

/// Errors that can occur in the hub.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The listen address could not be parsed.
    #[error("invalid listen address {addr}: {reason}")]
    InvalidAddress {
        /// Address as configured.
        addr: String,
        /// Parser message.
        reason: String,
    },

    /// Binding the listener failed.
    #[error("bind failed on {addr}: {source}")]
    Bind {
        /// Address as configured.
        addr: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The server stopped with an I/O error.
    #[error("serve error: {0}")]
    Serve(#[source] std::io::Error),

    /// No tick has completed or been restored yet.
    #[error("market data not available yet")]
    NotReady,

    /// Missing or rejected bearer token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A token could not be verified or issued.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// A response body could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotReady => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Auth(_) => (StatusCode::UNAUTHORIZED, "Invalid token".to_owned()),
            Self::Serialization(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("JSON error: {e}"))
            }
            Self::InvalidAddress { .. } | Self::Bind { .. } | Self::Serve(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
