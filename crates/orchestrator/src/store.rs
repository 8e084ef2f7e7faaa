//! Storage collaborators: the chat store contract and its SQLite backing.

use agent_tools::{AccessToken, CredentialStore, ToolError};
use async_trait::async_trait;
use brain_core::{ChatMessage, MessagePart, Role, Usage};
use database::models::{Chat, Message, StreamRecord};
use database::{account, chat, message, stream, Database, DatabaseError, Result};

/// A message together with the chat it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub chat_id: String,
    pub message: ChatMessage,
}

/// Everything the orchestrator needs from persistent storage.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn create_chat(&self, chat: &Chat) -> Result<()>;

    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>>;

    async fn update_title(&self, chat_id: &str, title: &str) -> Result<()>;

    /// Overwrite the chat's usage snapshot.
    async fn update_last_context(&self, chat_id: &str, usage: &Usage) -> Result<()>;

    /// Delete a chat and, by cascade, its messages and stream ids.
    async fn delete_chat(&self, chat_id: &str) -> Result<()>;

    /// Messages of a chat in timestamp order.
    async fn list_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>>;

    /// Append messages atomically.
    async fn append_messages(&self, chat_id: &str, messages: &[ChatMessage]) -> Result<()>;

    async fn get_message(&self, message_id: &str) -> Result<Option<StoredMessage>>;

    /// Delete every message of the chat created strictly after `timestamp`.
    async fn delete_messages_after(&self, chat_id: &str, timestamp: i64) -> Result<u64>;

    /// User-authored messages across all of the user's chats since `since`.
    async fn count_user_messages_since(&self, user_id: &str, since: i64) -> Result<i64>;

    async fn create_stream(&self, stream_id: &str, chat_id: &str, created_at: i64) -> Result<()>;

    async fn get_stream(&self, stream_id: &str) -> Result<Option<StreamRecord>>;

    async fn latest_stream_for_chat(&self, chat_id: &str) -> Result<Option<StreamRecord>>;

    /// Check connectivity.
    async fn ping(&self) -> Result<()>;
}

fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(DatabaseError::NotFound { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

fn invalid(err: impl std::fmt::Display) -> DatabaseError {
    DatabaseError::InvalidData {
        entity: "message",
        reason: err.to_string(),
    }
}

fn to_record(chat_id: &str, message: &ChatMessage) -> Result<Message> {
    let attachments: Vec<&MessagePart> = message
        .parts
        .iter()
        .filter(|part| matches!(part, MessagePart::File { .. }))
        .collect();

    Ok(Message {
        id: message.id.clone(),
        chat_id: chat_id.to_string(),
        role: message.role.as_str().to_string(),
        parts: serde_json::to_string(&message.parts).map_err(invalid)?,
        attachments: serde_json::to_string(&attachments).map_err(invalid)?,
        created_at: message.created_at,
    })
}

fn from_record(record: Message) -> Result<ChatMessage> {
    let role = Role::parse(&record.role)
        .ok_or_else(|| invalid(format!("unknown role '{}' on {}", record.role, record.id)))?;
    let parts: Vec<MessagePart> = serde_json::from_str(&record.parts).map_err(invalid)?;
    Ok(ChatMessage::new(record.id, role, parts).with_created_at(record.created_at))
}

#[async_trait]
impl ChatStore for Database {
    async fn create_chat(&self, record: &Chat) -> Result<()> {
        chat::create_chat(self.pool(), record).await
    }

    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>> {
        optional(chat::get_chat(self.pool(), chat_id).await)
    }

    async fn update_title(&self, chat_id: &str, title: &str) -> Result<()> {
        chat::update_title(self.pool(), chat_id, title).await
    }

    async fn update_last_context(&self, chat_id: &str, usage: &Usage) -> Result<()> {
        let context = serde_json::to_string(usage).map_err(|e| DatabaseError::InvalidData {
            entity: "chat",
            reason: e.to_string(),
        })?;
        chat::update_last_context(self.pool(), chat_id, &context).await
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<()> {
        chat::delete_chat(self.pool(), chat_id).await
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>> {
        message::list_messages(self.pool(), chat_id)
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }

    async fn append_messages(&self, chat_id: &str, messages: &[ChatMessage]) -> Result<()> {
        let records = messages
            .iter()
            .map(|message| to_record(chat_id, message))
            .collect::<Result<Vec<_>>>()?;
        message::insert_messages(self.pool(), &records).await
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<StoredMessage>> {
        match optional(message::get_message(self.pool(), message_id).await)? {
            Some(record) => {
                let chat_id = record.chat_id.clone();
                Ok(Some(StoredMessage {
                    chat_id,
                    message: from_record(record)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn delete_messages_after(&self, chat_id: &str, timestamp: i64) -> Result<u64> {
        message::delete_messages_after(self.pool(), chat_id, timestamp).await
    }

    async fn count_user_messages_since(&self, user_id: &str, since: i64) -> Result<i64> {
        message::count_user_messages_since(self.pool(), user_id, since).await
    }

    async fn create_stream(&self, stream_id: &str, chat_id: &str, created_at: i64) -> Result<()> {
        let record = StreamRecord {
            id: stream_id.to_string(),
            chat_id: chat_id.to_string(),
            created_at,
        };
        stream::create_stream(self.pool(), &record).await
    }

    async fn get_stream(&self, stream_id: &str) -> Result<Option<StreamRecord>> {
        optional(stream::get_stream(self.pool(), stream_id).await)
    }

    async fn latest_stream_for_chat(&self, chat_id: &str) -> Result<Option<StreamRecord>> {
        stream::latest_stream_for_chat(self.pool(), chat_id).await
    }

    async fn ping(&self) -> Result<()> {
        Database::ping(self).await
    }
}

/// OAuth tokens read from the `account` table.
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    database: Database,
}

impl AccountCredentials {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl CredentialStore for AccountCredentials {
    async fn access_token(
        &self,
        user_id: &str,
        provider: &str,
    ) -> std::result::Result<Option<AccessToken>, ToolError> {
        let account = account::get_account(self.database.pool(), user_id, provider)
            .await
            .map_err(|e| ToolError::Credentials(e.to_string()))?;

        Ok(account.and_then(|account| {
            let token = account.access_token.filter(|token| !token.is_empty())?;
            let scopes = account
                .scope
                .as_deref()
                .map(AccessToken::parse_scopes)
                .unwrap_or_default();
            Some(AccessToken::new(token, scopes))
        }))
    }
}
