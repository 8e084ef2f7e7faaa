//! Database models.
//!
//! Message parts, attachments and usage snapshots are stored as JSON text;
//! callers own their encoding.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A conversation owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Chat {
    /// Opaque chat id chosen by the client.
    pub id: String,
    /// Owning user id.
    pub user_id: String,
    pub title: String,
    /// Creation time in unix milliseconds.
    pub created_at: i64,
    /// Usage snapshot of the last completed turn (JSON).
    pub last_context: Option<String>,
}

/// A persisted chat message. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    /// "user", "assistant" or "system".
    pub role: String,
    /// Ordered message parts (JSON array).
    pub parts: String,
    /// Attachments (JSON array).
    pub attachments: String,
    /// Creation time in unix milliseconds.
    pub created_at: i64,
}

/// A resumable stream id issued for a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct StreamRecord {
    pub id: String,
    pub chat_id: String,
    /// Creation time in unix milliseconds.
    pub created_at: i64,
}

/// An OAuth grant for one (user, provider) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub user_id: String,
    /// Provider id, e.g. "google".
    pub provider_id: String,
    pub access_token: Option<String>,
    /// Granted scopes as returned by the provider (space or comma separated).
    pub scope: Option<String>,
    /// Last update time in unix milliseconds.
    pub updated_at: i64,
}
