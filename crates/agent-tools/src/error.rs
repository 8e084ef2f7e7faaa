//! Error types for tool operations.

use thiserror::Error;

/// Errors that can occur during tool execution.
///
/// None of these are retried by the registry. The step loop turns them into
/// error tool results that the model gets to see.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool not found in registry.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// Missing required parameter.
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// Invalid parameter value.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Credential lookup failed.
    #[error("Credential lookup failed: {0}")]
    Credentials(String),

    /// General execution error.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl ToolError {
    /// Whether the error was caused by the arguments the model produced.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            ToolError::MissingParameter(_) | ToolError::InvalidParameter { .. }
        )
    }
}
