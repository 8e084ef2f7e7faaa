//! Error types for brain operations.

use thiserror::Error;

/// Errors raised by a model backend.
#[derive(Debug, Clone, Error)]
pub enum BrainError {
    /// The backend is misconfigured (missing key, bad URL, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request never reached the backend or the connection dropped.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with an error status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The backend answered but the payload could not be interpreted.
    #[error("processing failed: {0}")]
    ProcessingFailed(String),
}

impl BrainError {
    /// Whether the error originates from a bad or missing API key.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, BrainError::Api { status: 401 | 403, .. })
    }
}
