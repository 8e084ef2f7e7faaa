//! Chat service: the entry point for turn submission, resume, stop and
//! chat management.
//!
//! # Turn lifecycle
//!
//! ```text
//! submit_turn
//!   validate -> model + entitlement -> rate limit -> per-chat lock
//!   -> chat (create or check owner) -> persist user message
//!   -> stream id -> title task (new chats) -> spawn turn task
//!
//! turn task
//!   start -> step loop (timeout, cancellation)
//!   -> persist assistant message -> usage snapshot -> release lock
//!   -> data-usage | error | abort
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use agent_tools::{resolve_tools, CredentialStore, NoCredentials, ToolCategory, ToolContext, ToolRegistry};
use brain_core::{ChatMessage, MessagePart, Role, DEFAULT_SYSTEM_PROMPT};
use chrono::Utc;
use database::models::Chat;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::entitlements::{Session, RATE_LIMIT_WINDOW_HOURS};
use crate::error::ChatError;
use crate::events::{EventEmitter, EventSink, GENERIC_ERROR_TEXT, TIMEOUT_ERROR_TEXT};
use crate::model_selection::{ModelCatalog, ModelDescriptor, ModelInfo, DEFAULT_CHAT_MODEL};
use crate::persistence::PersistenceCoordinator;
use crate::resumable::{EventStream, ResumableStreams};
use crate::step_loop::{StepLoop, StepLoopError, MAX_STEPS};
use crate::store::ChatStore;

/// Maximum characters of text in one user message.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Media types accepted for file parts.
pub const ACCEPTED_MEDIA_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// Default wall-clock ceiling for one turn.
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(60);

/// Reason carried by the `abort` event of a stopped turn.
pub const STOPPED_BY_USER: &str = "stopped by user";

/// Service-wide settings.
#[derive(Debug, Clone)]
pub struct ChatServiceConfig {
    pub system_prompt: String,
    pub turn_timeout: Duration,
    pub max_steps: usize,
}

impl Default for ChatServiceConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            turn_timeout: DEFAULT_TURN_TIMEOUT,
            max_steps: MAX_STEPS,
        }
    }
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

/// One user turn as submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    /// Chat id. A new id creates the chat.
    pub id: String,
    pub message: ChatMessage,
    #[serde(default = "default_chat_model")]
    pub selected_chat_model: String,
    /// Tool categories to enable in addition to weather.
    #[serde(default)]
    pub enabled_tools: Vec<String>,
}

impl TurnRequest {
    pub fn new(chat_id: impl Into<String>, message: ChatMessage) -> Self {
        Self {
            id: chat_id.into(),
            message,
            selected_chat_model: default_chat_model(),
            enabled_tools: Vec::new(),
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.selected_chat_model = model_id.into();
        self
    }

    pub fn with_tools<S: Into<String>>(mut self, categories: impl IntoIterator<Item = S>) -> Self {
        self.enabled_tools = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Check the request shape.
    pub fn validate(&self) -> Result<(), ChatError> {
        if self.id.trim().is_empty() {
            return Err(ChatError::BadRequest("chat id is required".to_string()));
        }
        if self.message.id.trim().is_empty() {
            return Err(ChatError::BadRequest("message id is required".to_string()));
        }
        if self.message.role != Role::User {
            return Err(ChatError::BadRequest("message role must be user".to_string()));
        }
        if self.message.parts.is_empty() {
            return Err(ChatError::BadRequest("message has no parts".to_string()));
        }

        let mut text_chars = 0;
        for part in &self.message.parts {
            match part {
                MessagePart::Text { text } => text_chars += text.chars().count(),
                MessagePart::File { media_type, .. } => {
                    if !ACCEPTED_MEDIA_TYPES.contains(&media_type.as_str()) {
                        return Err(ChatError::BadRequest(format!(
                            "unsupported media type: {}",
                            media_type
                        )));
                    }
                }
                _ => {
                    return Err(ChatError::BadRequest(
                        "user messages may only contain text and file parts".to_string(),
                    ))
                }
            }
        }

        if text_chars > MAX_MESSAGE_CHARS {
            return Err(ChatError::BadRequest(format!(
                "message text exceeds {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        Ok(())
    }
}

/// An accepted turn: ids plus the live event stream.
pub struct TurnStream {
    pub chat_id: String,
    pub stream_id: String,
    /// Id of the assistant message being generated.
    pub message_id: String,
    pub events: EventStream,
}

impl std::fmt::Debug for TurnStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnStream")
            .field("chat_id", &self.chat_id)
            .field("stream_id", &self.stream_id)
            .field("message_id", &self.message_id)
            .finish()
    }
}

#[derive(Default)]
struct ActiveTurns {
    turns: Mutex<HashMap<String, CancellationToken>>,
}

impl ActiveTurns {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.turns.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(self: &Arc<Self>, chat_id: &str) -> Result<ActiveTurn, ChatError> {
        let mut turns = self.lock();
        if turns.contains_key(chat_id) {
            return Err(ChatError::Conflict(format!(
                "chat {} already has a turn in progress",
                chat_id
            )));
        }

        let cancel = CancellationToken::new();
        turns.insert(chat_id.to_string(), cancel.clone());
        Ok(ActiveTurn {
            chat_id: chat_id.to_string(),
            cancel,
            turns: self.clone(),
        })
    }

    fn cancel(&self, chat_id: &str) -> bool {
        match self.lock().get(chat_id) {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn is_active(&self, chat_id: &str) -> bool {
        self.lock().contains_key(chat_id)
    }
}

/// Per-chat turn lock, released on drop.
struct ActiveTurn {
    chat_id: String,
    cancel: CancellationToken,
    turns: Arc<ActiveTurns>,
}

impl Drop for ActiveTurn {
    fn drop(&mut self) {
        self.turns.lock().remove(&self.chat_id);
    }
}

/// Everything the spawned turn task owns.
struct Turn {
    chat_id: String,
    user_message: ChatMessage,
    history: Vec<ChatMessage>,
    model: ModelDescriptor,
    tools: ToolRegistry,
    context: ToolContext,
    emitter: EventEmitter,
    lock: ActiveTurn,
}

/// Orchestrates chat turns over a store, a model catalog and a tool registry.
#[derive(Clone)]
pub struct ChatService {
    persistence: PersistenceCoordinator,
    catalog: Arc<ModelCatalog>,
    registry: Arc<ToolRegistry>,
    credentials: Arc<dyn CredentialStore>,
    streams: Option<Arc<ResumableStreams>>,
    config: ChatServiceConfig,
    active: Arc<ActiveTurns>,
}

impl ChatService {
    pub fn new(store: Arc<dyn ChatStore>, catalog: ModelCatalog, registry: ToolRegistry) -> Self {
        Self {
            persistence: PersistenceCoordinator::new(store),
            catalog: Arc::new(catalog),
            registry: Arc::new(registry),
            credentials: Arc::new(NoCredentials),
            streams: None,
            config: ChatServiceConfig::default(),
            active: Arc::new(ActiveTurns::default()),
        }
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Enable resumable streams.
    pub fn with_resumable_streams(mut self, streams: Arc<ResumableStreams>) -> Self {
        self.streams = Some(streams);
        self
    }

    pub fn with_config(mut self, config: ChatServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ChatServiceConfig {
        &self.config
    }

    pub fn resumable_streams(&self) -> Option<&Arc<ResumableStreams>> {
        self.streams.as_ref()
    }

    fn store(&self) -> &Arc<dyn ChatStore> {
        self.persistence.store()
    }

    /// Accept a user turn and start generating the assistant response.
    ///
    /// Errors are returned before any model work starts. Once this returns
    /// `Ok`, every outcome arrives on the event stream.
    pub async fn submit_turn(
        &self,
        session: &Session,
        request: TurnRequest,
    ) -> Result<TurnStream, ChatError> {
        request.validate()?;

        let entitlements = session.entitlements();
        if !entitlements.allows_model(&request.selected_chat_model) {
            return Err(ChatError::BadRequest(format!(
                "model not available: {}",
                request.selected_chat_model
            )));
        }
        let model = self
            .catalog
            .get(&request.selected_chat_model)
            .cloned()
            .ok_or_else(|| {
                ChatError::BadRequest(format!("unknown model: {}", request.selected_chat_model))
            })?;

        let now = Utc::now().timestamp_millis();
        let window_start = now - RATE_LIMIT_WINDOW_HOURS * 60 * 60 * 1000;
        let turns = self
            .store()
            .count_user_messages_since(&session.user_id, window_start)
            .await?;
        if !entitlements.allows_turn(turns) {
            warn!(user_id = %session.user_id, turns, "Turn rate limit reached");
            return Err(ChatError::RateLimited(format!(
                "limit of {} messages per {} hours reached",
                entitlements.max_messages_per_day, RATE_LIMIT_WINDOW_HOURS
            )));
        }

        let chat_id = request.id;
        self.persistence.owned_chat(&chat_id, &session.user_id).await?;
        let lock = self.active.acquire(&chat_id)?;

        let (_, created) = self
            .persistence
            .ensure_chat(&chat_id, &session.user_id, &request.message, now)
            .await?;

        let mut history = self.store().list_messages(&chat_id).await?;
        let created_at = history
            .last()
            .map_or(now, |last| now.max(last.created_at + 1));
        let user_message = request.message.with_created_at(created_at);
        self.persistence.save_user_message(&chat_id, &user_message).await?;
        history.push(user_message.clone());

        let stream_id = Uuid::new_v4().to_string();
        self.persistence.create_stream(&chat_id, &stream_id, now).await?;

        if created {
            match self.catalog.title_model() {
                Some(title_model) => {
                    self.persistence
                        .spawn_title(title_model.clone(), chat_id.clone(), user_message.clone());
                }
                None => debug!(chat_id = %chat_id, "No title model configured"),
            }
        }

        let (sink, events): (Box<dyn EventSink>, EventStream) = match &self.streams {
            Some(streams) => {
                let publisher = streams.begin(&stream_id, &chat_id)?;
                (Box::new(publisher), streams.attach(&stream_id, 0))
            }
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                (Box::new(tx), Box::pin(UnboundedReceiverStream::new(rx)))
            }
        };

        let message_id = Uuid::new_v4().to_string();
        let mut categories = vec![ToolCategory::Weather.as_str().to_string()];
        categories.extend(request.enabled_tools);
        let tools = resolve_tools(&self.registry, &categories);

        info!(
            chat_id = %chat_id,
            stream_id = %stream_id,
            model = %model.id,
            tools = tools.len(),
            "Turn accepted"
        );

        let turn = Turn {
            chat_id: chat_id.clone(),
            user_message,
            history,
            model,
            tools,
            context: ToolContext::new(session.user_id.clone(), self.credentials.clone()),
            emitter: EventEmitter::new(message_id.clone(), sink),
            lock,
        };
        tokio::spawn(self.clone().run_turn(turn));

        Ok(TurnStream {
            chat_id,
            stream_id,
            message_id,
            events,
        })
    }

    async fn run_turn(self, turn: Turn) {
        let Turn {
            chat_id,
            user_message,
            history,
            model,
            tools,
            context,
            mut emitter,
            lock,
        } = turn;

        emitter.start();

        let step_loop = StepLoop::new(model.brain().clone(), model.backend_model.clone(), tools, context)
            .with_system(self.config.system_prompt.clone())
            .with_max_steps(self.config.max_steps)
            .with_cancellation(lock.cancel.clone());

        let result = tokio::time::timeout(
            self.config.turn_timeout,
            step_loop.run(history, &mut emitter),
        )
        .await;

        match result {
            Ok(Ok(outcome)) => {
                let created_at = Utc::now().timestamp_millis().max(user_message.created_at + 1);
                let message = ChatMessage::new(emitter.message_id(), Role::Assistant, outcome.parts)
                    .with_created_at(created_at);

                if message.parts.is_empty() {
                    debug!(chat_id = %chat_id, "Assistant turn produced no parts");
                } else if let Err(err) = self.persistence.save_assistant_message(&chat_id, &message).await {
                    error!(chat_id = %chat_id, error = %err, "Failed to save assistant message");
                    drop(lock);
                    emitter.error(GENERIC_ERROR_TEXT);
                    return;
                }
                self.persistence.save_usage(&chat_id, &outcome.usage).await;

                info!(
                    chat_id = %chat_id,
                    steps = outcome.steps,
                    total_tokens = outcome.usage.total_tokens,
                    "Turn completed"
                );
                drop(lock);
                emitter.usage(outcome.usage);
            }
            Ok(Err(StepLoopError::Cancelled)) => {
                info!(chat_id = %chat_id, "Turn stopped by user");
                drop(lock);
                emitter.abort(STOPPED_BY_USER);
            }
            Ok(Err(StepLoopError::Model(err))) => {
                error!(chat_id = %chat_id, error = %err, "Turn failed");
                drop(lock);
                emitter.error(GENERIC_ERROR_TEXT);
            }
            Err(_) => {
                warn!(
                    chat_id = %chat_id,
                    timeout_secs = self.config.turn_timeout.as_secs_f64(),
                    "Turn timed out"
                );
                lock.cancel.cancel();
                drop(lock);
                emitter.error(TIMEOUT_ERROR_TEXT);
            }
        }
    }

    /// Load a chat the caller owns.
    async fn owned_chat(&self, session: &Session, chat_id: &str) -> Result<Chat, ChatError> {
        let chat = self
            .store()
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("chat {}", chat_id)))?;
        if chat.user_id != session.user_id {
            return Err(ChatError::Forbidden(format!(
                "chat {} belongs to another user",
                chat_id
            )));
        }
        Ok(chat)
    }

    /// Cancel the chat's active turn. Returns whether one was running.
    pub async fn stop(&self, session: &Session, chat_id: &str) -> Result<bool, ChatError> {
        self.owned_chat(session, chat_id).await?;
        let stopped = self.active.cancel(chat_id);
        info!(chat_id = %chat_id, stopped, "Stop requested");
        Ok(stopped)
    }

    /// Whether the chat has a turn in flight.
    pub fn is_active(&self, chat_id: &str) -> bool {
        self.active.is_active(chat_id)
    }

    /// Attach to a specific stream from `offset`.
    ///
    /// `None` when resumable streams are disabled or the stream can no
    /// longer be resumed.
    pub async fn resume_stream(
        &self,
        session: &Session,
        stream_id: &str,
        offset: usize,
    ) -> Result<Option<EventStream>, ChatError> {
        let Some(streams) = &self.streams else {
            return Ok(None);
        };

        let record = self
            .store()
            .get_stream(stream_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("stream {}", stream_id)))?;
        self.owned_chat(session, &record.chat_id).await?;

        if !streams.is_resumable(stream_id) {
            debug!(stream_id = %stream_id, "Stream is not resumable");
            return Ok(None);
        }
        Ok(Some(streams.attach(stream_id, offset)))
    }

    /// Attach to the chat's latest stream from `offset`.
    pub async fn resume_chat(
        &self,
        session: &Session,
        chat_id: &str,
        offset: usize,
    ) -> Result<Option<EventStream>, ChatError> {
        let Some(streams) = &self.streams else {
            return Ok(None);
        };

        self.owned_chat(session, chat_id).await?;
        let Some(record) = self.store().latest_stream_for_chat(chat_id).await? else {
            return Ok(None);
        };

        if !streams.is_resumable(&record.id) {
            debug!(chat_id = %chat_id, stream_id = %record.id, "Latest stream is not resumable");
            return Ok(None);
        }
        Ok(Some(streams.attach(&record.id, offset)))
    }

    /// Delete a chat with its messages, stopping any turn in flight.
    pub async fn delete_chat(&self, session: &Session, chat_id: &str) -> Result<Chat, ChatError> {
        let chat = self.owned_chat(session, chat_id).await?;
        self.active.cancel(chat_id);
        self.store().delete_chat(chat_id).await?;
        info!(chat_id = %chat_id, "Deleted chat");
        Ok(chat)
    }

    /// Delete every message of the chat created after `message_id`.
    pub async fn delete_trailing_messages(
        &self,
        session: &Session,
        message_id: &str,
    ) -> Result<u64, ChatError> {
        let stored = self
            .store()
            .get_message(message_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("message {}", message_id)))?;
        self.owned_chat(session, &stored.chat_id).await?;

        let deleted = self
            .store()
            .delete_messages_after(&stored.chat_id, stored.message.created_at)
            .await?;
        info!(chat_id = %stored.chat_id, message_id = %message_id, deleted, "Deleted trailing messages");
        Ok(deleted)
    }

    /// Models the caller may select.
    pub fn models_for(&self, session: &Session) -> Vec<ModelInfo> {
        self.catalog.available(&session.entitlements())
    }

    /// Check storage connectivity.
    pub async fn health(&self) -> Result<(), ChatError> {
        self.store()
            .ping()
            .await
            .map_err(|err| ChatError::Offline(err.to_string()))
    }
}
