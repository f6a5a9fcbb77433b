//! Error taxonomy for the bridge.
//!
//! Only per-guild role lookups recover locally; every other error aborts the
//! request and is surfaced through [`BridgeError::status_code`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rust_common::PlatformError;
use thiserror::Error;
use tracing::{error, warn};

/// Errors surfaced by the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A required credential or setting is missing.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller-supplied parameters are inconsistent with configuration.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The identity provider failed or answered with an unexpected shape.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The upstream identity has not verified its email.
    #[error("Upstream identity is not verified")]
    UnverifiedIdentity,

    /// The signing key could not be loaded, generated or persisted.
    #[error("Key management error: {0}")]
    KeyManagement(String),
}

impl BridgeError {
    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a validation error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an upstream error.
    #[must_use]
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create a key management error.
    #[must_use]
    pub fn key_management(msg: impl Into<String>) -> Self {
        Self::KeyManagement(msg.into())
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) | Self::Upstream(_) | Self::UnverifiedIdentity => {
                StatusCode::BAD_REQUEST
            }
            Self::KeyManagement(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Body text returned to the caller. Server-side failures never expose
    /// their internal detail.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "Service is not configured",
            Self::Validation(_) => "Invalid parameters",
            Self::Upstream(_) | Self::UnverifiedIdentity => "Bad request.",
            Self::KeyManagement(_) => "Signing unavailable",
        }
    }
}

impl From<PlatformError> for BridgeError {
    fn from(err: PlatformError) -> Self {
        if err.is_retryable() {
            Self::KeyManagement(format!("transient store failure: {err}"))
        } else {
            Self::KeyManagement(format!("store failure: {err}"))
        }
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for BridgeError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::KeyManagement(format!("token signing failed: {err}"))
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, self.public_message()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            BridgeError::config("missing").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(BridgeError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(BridgeError::upstream("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(BridgeError::UnverifiedIdentity.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            BridgeError::key_management("down").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_store_failure_becomes_key_management() {
        let err: BridgeError = PlatformError::unavailable("redis").into();
        assert!(matches!(err, BridgeError::KeyManagement(_)));
    }

    #[test]
    fn test_store_failure_tags_transient_errors() {
        let transient: BridgeError = PlatformError::unavailable("redis").into();
        assert!(transient.to_string().contains("transient store failure"));

        let permanent: BridgeError = PlatformError::invalid_input("empty key").into();
        assert!(!permanent.to_string().contains("transient"));
        assert_eq!(permanent.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(permanent.public_message(), "Signing unavailable");
    }

    #[test]
    fn test_public_message_hides_detail() {
        let err = BridgeError::key_management("redis://secret-host refused");
        assert!(!err.public_message().contains("secret-host"));
    }
}
