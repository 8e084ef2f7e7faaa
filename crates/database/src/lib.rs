//! SQLite persistence layer for the Parley chat server.
//!
//! This crate provides async database operations for chats, messages,
//! resumable stream ids and OAuth accounts using SQLx with SQLite.
//!
//! # Example
//!
//! ```no_run
//! use database::{chat, models::Chat, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:parley.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     // Create a chat
//!     let chat = Chat {
//!         id: "chat-1".to_string(),
//!         user_id: "user-1".to_string(),
//!         title: "New chat".to_string(),
//!         created_at: 1_700_000_000_000,
//!         last_context: None,
//!     };
//!     chat::create_chat(db.pool(), &chat).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod chat;
pub mod error;
pub mod message;
pub mod models;
pub mod stream;

pub use error::{DatabaseError, Result};
pub use models::{Account, Chat, Message, StreamRecord};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// // File database
    /// let db = database::Database::connect("sqlite:data/parley.db?mode=rwc").await?;
    ///
    /// // In-memory database (for testing)
    /// let db = database::Database::connect("sqlite::memory:").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    ///
    /// In-memory databases always use a single long-lived connection, since
    /// every SQLite connection would otherwise get its own empty database.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(std::time::Duration::from_secs(30));
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(pool_size)
        };

        let pool = pool_options.connect_with(options).await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            if in_memory { 1 } else { pool_size }
        );

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check that the database answers a trivial query.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn chat(id: &str, user_id: &str) -> Chat {
        Chat {
            id: id.to_string(),
            user_id: user_id.to_string(),
            title: "New chat".to_string(),
            created_at: 1_000,
            last_context: None,
        }
    }

    fn message(id: &str, chat_id: &str, role: &str, created_at: i64) -> Message {
        Message {
            id: id.to_string(),
            chat_id: chat_id.to_string(),
            role: role.to_string(),
            parts: r#"[{"type":"text","text":"hi"}]"#.to_string(),
            attachments: "[]".to_string(),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_ping() {
        let db = test_db().await;
        db.ping().await.unwrap();
        db.close().await;
        assert!(db.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_chat_crud() {
        let db = test_db().await;

        chat::create_chat(db.pool(), &chat("c1", "u1")).await.unwrap();
        let result = chat::create_chat(db.pool(), &chat("c1", "u1")).await;
        assert!(matches!(result, Err(DatabaseError::AlreadyExists { .. })));

        chat::update_title(db.pool(), "c1", "Weather in Paris").await.unwrap();
        chat::update_last_context(db.pool(), "c1", r#"{"totalTokens":42}"#)
            .await
            .unwrap();
        let fetched = chat::get_chat(db.pool(), "c1").await.unwrap();
        assert_eq!(fetched.title, "Weather in Paris");
        assert_eq!(fetched.last_context.as_deref(), Some(r#"{"totalTokens":42}"#));

        chat::delete_chat(db.pool(), "c1").await.unwrap();
        let result = chat::get_chat(db.pool(), "c1").await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
        let result = chat::update_title(db.pool(), "c1", "x").await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_messages_ordered_and_cascade() {
        let db = test_db().await;
        chat::create_chat(db.pool(), &chat("c1", "u1")).await.unwrap();

        message::insert_messages(
            db.pool(),
            &[
                message("m2", "c1", "assistant", 20),
                message("m1", "c1", "user", 10),
                message("m3", "c1", "user", 20),
            ],
        )
        .await
        .unwrap();

        let ids: Vec<String> = message::list_messages(db.pool(), "c1")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);

        stream::create_stream(
            db.pool(),
            &StreamRecord {
                id: "s1".to_string(),
                chat_id: "c1".to_string(),
                created_at: 30,
            },
        )
        .await
        .unwrap();

        chat::delete_chat(db.pool(), "c1").await.unwrap();
        assert!(message::list_messages(db.pool(), "c1").await.unwrap().is_empty());
        assert!(stream::get_stream(db.pool(), "s1").await.is_err());
    }

    #[tokio::test]
    async fn test_insert_messages_is_atomic() {
        let db = test_db().await;
        chat::create_chat(db.pool(), &chat("c1", "u1")).await.unwrap();
        message::insert_messages(db.pool(), &[message("m1", "c1", "user", 10)])
            .await
            .unwrap();

        let result = message::insert_messages(
            db.pool(),
            &[message("m2", "c1", "user", 11), message("m1", "c1", "user", 12)],
        )
        .await;
        assert!(matches!(result, Err(DatabaseError::AlreadyExists { .. })));
        assert_eq!(message::list_messages(db.pool(), "c1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_messages_after_is_strict() {
        let db = test_db().await;
        chat::create_chat(db.pool(), &chat("c1", "u1")).await.unwrap();
        message::insert_messages(
            db.pool(),
            &[
                message("m1", "c1", "user", 100),
                message("m2", "c1", "assistant", 200),
                message("m3", "c1", "user", 300),
            ],
        )
        .await
        .unwrap();

        let deleted = message::delete_messages_after(db.pool(), "c1", 200).await.unwrap();
        assert_eq!(deleted, 1);
        let remaining = message::list_messages(db.pool(), "c1").await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(message::get_message(db.pool(), "m2").await.unwrap().created_at, 200);
    }

    #[tokio::test]
    async fn test_count_user_messages_since() {
        let db = test_db().await;
        chat::create_chat(db.pool(), &chat("c1", "u1")).await.unwrap();
        chat::create_chat(db.pool(), &chat("c2", "u1")).await.unwrap();
        chat::create_chat(db.pool(), &chat("c3", "u2")).await.unwrap();
        message::insert_messages(
            db.pool(),
            &[
                message("m1", "c1", "user", 50),
                message("m2", "c1", "user", 150),
                message("m3", "c1", "assistant", 160),
                message("m4", "c2", "user", 170),
                message("m5", "c3", "user", 180),
            ],
        )
        .await
        .unwrap();

        let count = message::count_user_messages_since(db.pool(), "u1", 100).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_latest_stream_for_chat() {
        let db = test_db().await;
        chat::create_chat(db.pool(), &chat("c1", "u1")).await.unwrap();
        assert!(stream::latest_stream_for_chat(db.pool(), "c1").await.unwrap().is_none());

        for (id, at) in [("s1", 10), ("s2", 20), ("s3", 20)] {
            stream::create_stream(
                db.pool(),
                &StreamRecord {
                    id: id.to_string(),
                    chat_id: "c1".to_string(),
                    created_at: at,
                },
            )
            .await
            .unwrap();
        }

        let latest = stream::latest_stream_for_chat(db.pool(), "c1").await.unwrap().unwrap();
        assert_eq!(latest.id, "s3");
    }

    #[tokio::test]
    async fn test_account_upsert() {
        let db = test_db().await;
        assert!(account::get_account(db.pool(), "u1", "google").await.unwrap().is_none());

        let mut grant = Account {
            user_id: "u1".to_string(),
            provider_id: "google".to_string(),
            access_token: Some("t1".to_string()),
            scope: Some("openid email".to_string()),
            updated_at: 1,
        };
        account::upsert_account(db.pool(), &grant).await.unwrap();
        grant.access_token = Some("t2".to_string());
        account::upsert_account(db.pool(), &grant).await.unwrap();

        let fetched = account::get_account(db.pool(), "u1", "google").await.unwrap().unwrap();
        assert_eq!(fetched.access_token.as_deref(), Some("t2"));
    }
}
