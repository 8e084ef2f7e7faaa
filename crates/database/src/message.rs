//! Message persistence.
//!
//! Messages are append-only. The only deletion besides removing the whole
//! chat is dropping every message after a cutoff timestamp.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::Message;

/// Insert messages in one transaction.
pub async fn insert_messages(pool: &SqlitePool, messages: &[Message]) -> Result<()> {
    let mut tx = pool.begin().await?;

    for message in messages {
        sqlx::query(
            r#"
            INSERT INTO message (id, chat_id, role, parts, attachments, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.chat_id)
        .bind(&message.role)
        .bind(&message.parts)
        .bind(&message.attachments)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.is_unique_violation() {
                    return DatabaseError::AlreadyExists {
                        entity: "Message",
                        id: message.id.clone(),
                    };
                }
            }
            DatabaseError::Sqlx(e)
        })?;
    }

    tx.commit().await?;
    Ok(())
}

/// List a chat's messages in timestamp order (ties in insertion order).
pub async fn list_messages(pool: &SqlitePool, chat_id: &str) -> Result<Vec<Message>> {
    let messages = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, chat_id, role, parts, attachments, created_at
        FROM message
        WHERE chat_id = ?
        ORDER BY created_at ASC, rowid ASC
        "#,
    )
    .bind(chat_id)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}

/// Get a message by ID.
pub async fn get_message(pool: &SqlitePool, id: &str) -> Result<Message> {
    sqlx::query_as::<_, Message>(
        r#"
        SELECT id, chat_id, role, parts, attachments, created_at
        FROM message
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Message",
        id: id.to_string(),
    })
}

/// Delete every message of a chat created strictly after `timestamp`.
pub async fn delete_messages_after(pool: &SqlitePool, chat_id: &str, timestamp: i64) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM message
        WHERE chat_id = ? AND created_at > ?
        "#,
    )
    .bind(chat_id)
    .bind(timestamp)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Count user-authored messages across all of a user's chats since `since`.
pub async fn count_user_messages_since(pool: &SqlitePool, user_id: &str, since: i64) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM message
        JOIN chat ON chat.id = message.chat_id
        WHERE chat.user_id = ? AND message.role = 'user' AND message.created_at >= ?
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
