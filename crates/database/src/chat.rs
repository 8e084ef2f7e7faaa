//! Chat CRUD operations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::Chat;

/// Create a new chat.
pub async fn create_chat(pool: &SqlitePool, chat: &Chat) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO chat (id, user_id, title, created_at, last_context)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&chat.id)
    .bind(&chat.user_id)
    .bind(&chat.title)
    .bind(chat.created_at)
    .bind(&chat.last_context)
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "Chat",
                    id: chat.id.clone(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    Ok(())
}

/// Get a chat by ID.
pub async fn get_chat(pool: &SqlitePool, id: &str) -> Result<Chat> {
    sqlx::query_as::<_, Chat>(
        r#"
        SELECT id, user_id, title, created_at, last_context
        FROM chat
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Chat",
        id: id.to_string(),
    })
}

/// Set a chat's title.
pub async fn update_title(pool: &SqlitePool, id: &str, title: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE chat
        SET title = ?
        WHERE id = ?
        "#,
    )
    .bind(title)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Chat",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Overwrite the chat's usage snapshot.
pub async fn update_last_context(pool: &SqlitePool, id: &str, context_json: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE chat
        SET last_context = ?
        WHERE id = ?
        "#,
    )
    .bind(context_json)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Chat",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Delete a chat. Its messages and stream ids are removed with it.
pub async fn delete_chat(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM chat
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Chat",
            id: id.to_string(),
        });
    }

    Ok(())
}
