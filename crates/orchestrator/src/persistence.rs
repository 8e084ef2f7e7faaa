//! Persistence coordinator.
//!
//! Orders every durable write of a turn: the chat row and the user message
//! before generation, the stream id after that, the assistant message once
//! the step loop is terminal, and the usage snapshot last.

use std::sync::Arc;

use brain_core::{
    clean_title, ChatMessage, CompletionRequest, Usage, MAX_TITLE_CHARS, TITLE_SYSTEM_PROMPT,
};
use database::models::Chat;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ChatError;
use crate::model_selection::TitleModel;
use crate::store::ChatStore;

/// Title a chat carries until (or instead of) a generated one.
pub const DEFAULT_CHAT_TITLE: &str = "New chat";

/// Fallback title: the first line of user text, capped at [`MAX_TITLE_CHARS`].
pub fn fallback_title(message: &ChatMessage) -> String {
    let text = message.text();
    let title: String = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect();

    if title.is_empty() {
        DEFAULT_CHAT_TITLE.to_string()
    } else {
        title
    }
}

/// Sequences the durable writes of a turn.
#[derive(Clone)]
pub struct PersistenceCoordinator {
    store: Arc<dyn ChatStore>,
}

impl PersistenceCoordinator {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    /// Load the chat, creating it for `user_id` when it does not exist.
    ///
    /// Returns the chat and whether it was created. A chat owned by someone
    /// else is `Forbidden`.
    /// The chat if it exists, `Forbidden` when another user owns it.
    pub async fn owned_chat(&self, chat_id: &str, user_id: &str) -> Result<Option<Chat>, ChatError> {
        match self.store.get_chat(chat_id).await? {
            Some(chat) if chat.user_id != user_id => Err(ChatError::Forbidden(format!(
                "chat {} belongs to another user",
                chat_id
            ))),
            chat => Ok(chat),
        }
    }

    pub async fn ensure_chat(
        &self,
        chat_id: &str,
        user_id: &str,
        first_message: &ChatMessage,
        now: i64,
    ) -> Result<(Chat, bool), ChatError> {
        if let Some(chat) = self.owned_chat(chat_id, user_id).await? {
            return Ok((chat, false));
        }

        let chat = Chat {
            id: chat_id.to_string(),
            user_id: user_id.to_string(),
            title: fallback_title(first_message),
            created_at: now,
            last_context: None,
        };
        self.store.create_chat(&chat).await?;
        info!(chat_id = %chat_id, user_id = %user_id, "Created chat");
        Ok((chat, true))
    }

    pub async fn save_user_message(&self, chat_id: &str, message: &ChatMessage) -> Result<(), ChatError> {
        self.store
            .append_messages(chat_id, std::slice::from_ref(message))
            .await?;
        debug!(chat_id = %chat_id, message_id = %message.id, "Saved user message");
        Ok(())
    }

    pub async fn create_stream(&self, chat_id: &str, stream_id: &str, now: i64) -> Result<(), ChatError> {
        self.store.create_stream(stream_id, chat_id, now).await?;
        debug!(chat_id = %chat_id, stream_id = %stream_id, "Created stream id");
        Ok(())
    }

    /// Persist the final assistant message as one append.
    pub async fn save_assistant_message(
        &self,
        chat_id: &str,
        message: &ChatMessage,
    ) -> Result<(), ChatError> {
        let dangling = message.dangling_tool_calls();
        if !dangling.is_empty() {
            return Err(ChatError::BadRequest(format!(
                "assistant message {} has tool calls without results: {}",
                message.id,
                dangling.join(", ")
            )));
        }

        self.store
            .append_messages(chat_id, std::slice::from_ref(message))
            .await?;
        debug!(
            chat_id = %chat_id,
            message_id = %message.id,
            parts = message.parts.len(),
            "Saved assistant message"
        );
        Ok(())
    }

    /// Overwrite the usage snapshot. Failures are logged, never returned.
    pub async fn save_usage(&self, chat_id: &str, usage: &Usage) {
        if let Err(err) = self.store.update_last_context(chat_id, usage).await {
            warn!(chat_id = %chat_id, error = %err, "Failed to save usage snapshot");
        }
    }

    /// Summarize the first message into a title in the background.
    ///
    /// The fallback title stays in place when generation fails.
    pub fn spawn_title(
        &self,
        title_model: TitleModel,
        chat_id: String,
        message: ChatMessage,
    ) -> JoinHandle<()> {
        let store = self.store.clone();
        tokio::spawn(async move {
            let request = CompletionRequest::new(
                title_model.backend_model.clone(),
                vec![ChatMessage::user(message.id.clone(), message.text())],
            )
            .with_system(TITLE_SYSTEM_PROMPT);

            let completion = match title_model.brain.complete(request).await {
                Ok(completion) => completion,
                Err(err) => {
                    warn!(chat_id = %chat_id, error = %err, "Title generation failed");
                    return;
                }
            };

            let Some(title) = clean_title(&completion.text) else {
                warn!(chat_id = %chat_id, "Title model returned an empty title");
                return;
            };

            match store.update_title(&chat_id, &title).await {
                Ok(()) => info!(chat_id = %chat_id, title = %title, "Generated chat title"),
                Err(err) => warn!(chat_id = %chat_id, error = %err, "Failed to save chat title"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brain_core::{Brain, BrainError, MessagePart, Role};
    use database::Database;
    use mock_brain::ScriptedBrain;

    async fn coordinator() -> PersistenceCoordinator {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        PersistenceCoordinator::new(Arc::new(db))
    }

    #[test]
    fn test_fallback_title() {
        assert_eq!(fallback_title(&ChatMessage::user("m1", "\n  Weather in Paris?\nthanks")), "Weather in Paris?");
        assert_eq!(fallback_title(&ChatMessage::user("m1", "   ")), DEFAULT_CHAT_TITLE);
        assert_eq!(
            fallback_title(&ChatMessage::user("m1", "x".repeat(300))).chars().count(),
            MAX_TITLE_CHARS
        );
    }

    #[tokio::test]
    async fn test_ensure_chat_creates_once_and_checks_owner() {
        let persistence = coordinator().await;
        let message = ChatMessage::user("m1", "Hello there");

        let (chat, created) = persistence.ensure_chat("c1", "u1", &message, 5).await.unwrap();
        assert!(created);
        assert_eq!(chat.title, "Hello there");

        let (_, created) = persistence.ensure_chat("c1", "u1", &message, 6).await.unwrap();
        assert!(!created);

        let err = persistence.ensure_chat("c1", "u2", &message, 7).await.unwrap_err();
        assert!(matches!(err, ChatError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_dangling_tool_calls_are_never_persisted() {
        let persistence = coordinator().await;
        let message = ChatMessage::user("m1", "hi");
        persistence.ensure_chat("c1", "u1", &message, 1).await.unwrap();

        let assistant = ChatMessage::new(
            "a1",
            Role::Assistant,
            vec![MessagePart::ToolCall {
                tool_call_id: "call-1".to_string(),
                tool_name: "getWeather".to_string(),
                input: serde_json::json!({"location": "Paris"}),
            }],
        );
        assert!(persistence.save_assistant_message("c1", &assistant).await.is_err());
        assert!(persistence.store().list_messages("c1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_title_generation_replaces_fallback() {
        let persistence = coordinator().await;
        let message = ChatMessage::user("m1", "what's the weather like in paris today?");
        persistence.ensure_chat("c1", "u1", &message, 1).await.unwrap();

        let brain = Arc::new(ScriptedBrain::new().then_text("\"Paris weather today\""));
        let title_model = TitleModel {
            brain: brain.clone() as Arc<dyn Brain>,
            backend_model: "small".to_string(),
        };
        persistence
            .spawn_title(title_model, "c1".to_string(), message)
            .await
            .unwrap();

        let chat = persistence.store().get_chat("c1").await.unwrap().unwrap();
        assert_eq!(chat.title, "Paris weather today");

        let request = &brain.requests().await[0];
        assert_eq!(request.system.as_deref(), Some(TITLE_SYSTEM_PROMPT));
        assert_eq!(request.model, "small");
    }

    #[tokio::test]
    async fn test_title_failure_keeps_fallback() {
        let persistence = coordinator().await;
        let message = ChatMessage::user("m1", "Plan my trip");
        persistence.ensure_chat("c1", "u1", &message, 1).await.unwrap();

        let title_model = TitleModel {
            brain: Arc::new(
                ScriptedBrain::new().then_error(BrainError::Network("down".to_string())),
            ),
            backend_model: "small".to_string(),
        };
        persistence
            .spawn_title(title_model, "c1".to_string(), message)
            .await
            .unwrap();

        let chat = persistence.store().get_chat("c1").await.unwrap().unwrap();
        assert_eq!(chat.title, "Plan my trip");
    }
}
