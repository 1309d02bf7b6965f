//! Transport error types.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use thiserror::Error;
use tm1_core::CoreError;

// ============================================================================
// HTTP Error
// ============================================================================

/// The server answered with a status of 400 or above.
#[derive(Debug, Clone, Error)]
#[error("{method} {url} failed with status {status}: {body}")]
pub struct HttpError {
    /// Request method.
    pub method: Method,
    /// Fully resolved request URL.
    pub url: String,
    /// Response status.
    pub status: StatusCode,
    /// Response body, truncated.
    pub body: String,
}

// ============================================================================
// Main Error
// ============================================================================

/// Error type for every operation that talks to a TM1 server.
#[derive(Debug, Error)]
pub enum Tm1Error {
    /// The server returned an error status.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Networking, TLS or a malformed/truncated response.
    #[error("Transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The auth provider refused to sign a request, or credential acquisition failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Client timeout or async polling deadline exceeded.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,

    /// Declared but unsupported feature.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Endpoint or base URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A header name or value was rejected.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// The server response did not follow the expected protocol.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Client-side error from the core crate.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An operation failed and restoring the chore's active state failed too.
    #[error("{inner} (reactivation also failed: {reactivation})")]
    Reactivation {
        /// Failure of the protected operation.
        inner: Box<Tm1Error>,
        /// Failure of the reactivation that followed.
        reactivation: Box<Tm1Error>,
    },
}

/// Result alias used throughout the client.
pub type Result<T, E = Tm1Error> = std::result::Result<T, E>;

impl Tm1Error {
    /// HTTP status, if this is an HTTP error.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http(e) => Some(e.status),
            Self::Reactivation { inner, .. } => inner.status(),
            _ => None,
        }
    }

    /// Returns true for a 404 response.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Returns true for a 401 response.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Returns true for a 409 response.
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(StatusCode::CONFLICT)
    }

    /// Shorthand for a validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Core(CoreError::Validation(msg.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: StatusCode) -> Tm1Error {
        Tm1Error::Http(HttpError {
            method: Method::GET,
            url: "https://tm1:8010/api/v1/Cubes('x')".into(),
            status,
            body: "{\"error\":{}}".into(),
        })
    }

    #[test]
    fn test_status_helpers() {
        assert!(http(StatusCode::NOT_FOUND).is_not_found());
        assert!(http(StatusCode::UNAUTHORIZED).is_unauthorized());
        assert!(http(StatusCode::CONFLICT).is_conflict());
        assert_eq!(Tm1Error::Cancelled.status(), None);
    }

    #[test]
    fn test_http_error_display() {
        let msg = http(StatusCode::NOT_FOUND).to_string();
        assert!(msg.contains("GET https://tm1:8010/api/v1/Cubes('x')"));
        assert!(msg.contains("404"));
    }

    #[test]
    fn test_reactivation_keeps_inner_status() {
        let err = Tm1Error::Reactivation {
            inner: Box::new(http(StatusCode::CONFLICT)),
            reactivation: Box::new(Tm1Error::Cancelled),
        };
        assert!(err.is_conflict());
        assert!(err.to_string().contains("reactivation also failed"));
    }
}
