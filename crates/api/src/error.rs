//! Error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator::ChatError;
use serde::Serialize;
use thiserror::Error;

const OFFLINE_MESSAGE: &str = "The service is temporarily unavailable. Please try again later.";

/// Errors returned by handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    /// The request body or query could not be parsed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Machine-readable `type:surface` code and HTTP status.
    pub fn code(&self) -> (&'static str, StatusCode) {
        match self {
            ApiError::InvalidRequest(_) | ApiError::Chat(ChatError::BadRequest(_)) => {
                ("bad_request:api", StatusCode::BAD_REQUEST)
            }
            ApiError::Chat(ChatError::Unauthorized) => ("unauthorized:chat", StatusCode::UNAUTHORIZED),
            ApiError::Chat(ChatError::Forbidden(_)) => ("forbidden:chat", StatusCode::FORBIDDEN),
            ApiError::Chat(ChatError::NotFound(_)) => ("not_found:chat", StatusCode::NOT_FOUND),
            ApiError::Chat(ChatError::Conflict(_)) => ("conflict:chat", StatusCode::CONFLICT),
            ApiError::Chat(ChatError::RateLimited(_)) => {
                ("rate_limit:chat", StatusCode::TOO_MANY_REQUESTS)
            }
            ApiError::Chat(ChatError::Database(_) | ChatError::Offline(_)) => {
                ("offline:chat", StatusCode::SERVICE_UNAVAILABLE)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, status) = self.code();
        let message = match &self {
            ApiError::Chat(ChatError::Database(_) | ChatError::Offline(_)) => {
                tracing::error!(error = %self, "Service unavailable");
                OFFLINE_MESSAGE.to_string()
            }
            ApiError::Chat(ChatError::Unauthorized) => {
                tracing::warn!("Unauthorized request");
                "You need to sign in before continuing.".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { code, message })).into_response()
    }
}

/// Result type for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
