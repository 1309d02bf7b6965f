//! Core error types for the TM1 client.

use thiserror::Error;

/// Errors raised by pure client-side logic (no network involved).
#[derive(Debug, Error)]
pub enum CoreError {
    /// A client-side precondition was violated.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A version-gated operation was invoked against an incompatible server.
    #[error("{feature} requires TM1 version {required}, server reports {actual}")]
    VersionUnsupported {
        /// Operation or endpoint family that is gated.
        feature: String,
        /// Version constraint, e.g. `>= 12.0.0` or `< 12.0.0`.
        required: String,
        /// Version reported by the server.
        actual: String,
    },

    /// The feature existed on older servers and has been removed.
    #[error("{feature} was removed in TM1 {removed_in}, server reports {actual}")]
    FeatureRemoved {
        /// Feature name.
        feature: String,
        /// First version without the feature.
        removed_in: String,
        /// Version reported by the server.
        actual: String,
    },

    /// The current user lacks a role the operation requires.
    #[error("Privilege required: {0}")]
    PrivilegeRequired(String),

    /// Data returned by the server did not have the expected shape.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Shorthand for a validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
