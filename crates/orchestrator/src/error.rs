//! Error types for chat operations.

use database::DatabaseError;
use thiserror::Error;

/// Errors surfaced by [`ChatService`](crate::ChatService) before a turn's
/// event stream opens.
///
/// Once streaming has begun, failures are reported as terminal `error`
/// events instead.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The request did not match the turn contract.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No valid session.
    #[error("unauthorized")]
    Unauthorized,

    /// The caller does not own the referenced chat.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The referenced chat, message or stream does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The chat already has a turn in flight, or an id was reused.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller's entitlement is exhausted.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Storage failed.
    #[error("database error: {0}")]
    Database(DatabaseError),

    /// The service cannot serve the request right now.
    #[error("offline: {0}")]
    Offline(String),
}

impl From<DatabaseError> for ChatError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::AlreadyExists { entity, id } => {
                ChatError::Conflict(format!("{} already exists: {}", entity, id))
            }
            other => ChatError::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_records_become_conflicts() {
        let err: ChatError = DatabaseError::AlreadyExists {
            entity: "message",
            id: "m1".to_string(),
        }
        .into();
        assert!(matches!(err, ChatError::Conflict(ref msg) if msg.contains("m1")));

        let err: ChatError = DatabaseError::NotFound {
            entity: "chat",
            id: "c1".to_string(),
        }
        .into();
        assert!(matches!(err, ChatError::Database(_)));
    }
}
