//! Resumable stream id records.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::StreamRecord;

/// Record a new stream id for a chat.
pub async fn create_stream(pool: &SqlitePool, stream: &StreamRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO stream (id, chat_id, created_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(&stream.id)
    .bind(&stream.chat_id)
    .bind(stream.created_at)
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "Stream",
                    id: stream.id.clone(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    Ok(())
}

/// Get a stream record by ID.
pub async fn get_stream(pool: &SqlitePool, id: &str) -> Result<StreamRecord> {
    sqlx::query_as::<_, StreamRecord>(
        r#"
        SELECT id, chat_id, created_at
        FROM stream
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Stream",
        id: id.to_string(),
    })
}

/// The most recently created stream of a chat, if any.
pub async fn latest_stream_for_chat(pool: &SqlitePool, chat_id: &str) -> Result<Option<StreamRecord>> {
    let stream = sqlx::query_as::<_, StreamRecord>(
        r#"
        SELECT id, chat_id, created_at
        FROM stream
        WHERE chat_id = ?
        ORDER BY created_at DESC, rowid DESC
        LIMIT 1
        "#,
    )
    .bind(chat_id)
    .fetch_optional(pool)
    .await?;

    Ok(stream)
}
