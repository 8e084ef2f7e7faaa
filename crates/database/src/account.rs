//! OAuth account storage.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::Account;

/// Insert or replace the grant for `(user_id, provider_id)`.
pub async fn upsert_account(pool: &SqlitePool, account: &Account) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO account (user_id, provider_id, access_token, scope, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(user_id, provider_id) DO UPDATE SET
            access_token = excluded.access_token,
            scope = excluded.scope,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&account.user_id)
    .bind(&account.provider_id)
    .bind(&account.access_token)
    .bind(&account.scope)
    .bind(account.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the grant for `(user_id, provider_id)`, if the user connected one.
pub async fn get_account(pool: &SqlitePool, user_id: &str, provider_id: &str) -> Result<Option<Account>> {
    let account = sqlx::query_as::<_, Account>(
        r#"
        SELECT user_id, provider_id, access_token, scope, updated_at
        FROM account
        WHERE user_id = ? AND provider_id = ?
        "#,
    )
    .bind(user_id)
    .bind(provider_id)
    .fetch_optional(pool)
    .await?;

    Ok(account)
}
