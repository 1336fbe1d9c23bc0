//! Error types for the provider gateway.

use thiserror::Error;

/// A result type using `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors that can occur while talking to the provider.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request failed at the transport level (connect, TLS, read).
    #[error("transport error: {0}")]
    Transport(reqwest::Error),

    /// The request timed out on every transport-level retry.
    #[error("request timed out after {attempts} attempts")]
    TimedOut {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// The resource stayed locked (HTTP 423) through every retry.
    #[error("resource stayed locked after {attempts} attempts")]
    LockedTooLong {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// The provider rejected the request with HTTP 409 Conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The provider reported an error in its response envelope.
    #[error("provider error: {0}")]
    Provider(String),

    /// A response body that should have been JSON was not.
    #[error("invalid JSON in response: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A response body lacked an expected field.
    #[error("response is missing field `{field}`")]
    MissingField {
        /// Name of the missing field.
        field: String,
    },

    /// A response body was empty where one was required.
    #[error("request failed: no response body was returned")]
    EmptyResponse,
}

impl ApiError {
    /// Returns true if the failure happened below the provider's API
    /// surface and a later attempt might succeed.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::TimedOut { .. })
    }
}
