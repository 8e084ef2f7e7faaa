//! Chat streaming orchestration engine.
//!
//! This crate provides the [`ChatService`] type, which takes a user turn,
//! selects a model backend and a set of tools, drives a bounded multi-step
//! generation loop, streams typed events, persists the resulting messages,
//! and lets disconnected clients resume where they left off.
//!
//! # Architecture
//!
//! ```text
//! TurnRequest (from api)
//!          ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CHAT SERVICE                          │
//! │                                                             │
//! │  1. Validate, check entitlements and rate limit             │
//! │         ↓                                                   │
//! │  2. Persist user message, create stream id                  │
//! │         ↓                                                   │
//! │  3. Step loop (max 5 model invocations)                     │
//! │     • stream text / reasoning deltas                        │
//! │     • run requested tools concurrently                      │
//! │     • feed results back to the model                        │
//! │         ↓                                                   │
//! │  4. Persist assistant message, then usage snapshot          │
//! │         ↓                                                   │
//! │  5. Terminal event: data-usage | error | abort              │
//! └─────────────────────────────────────────────────────────────┘
//!          ↓
//! EventEmitter → mpsc channel | ResumableStreams (replay + follow)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use orchestrator::{ChatService, ModelCatalog, ResumableStreams, Session, TurnRequest};
//!
//! let service = ChatService::new(Arc::new(database), ModelCatalog::standard(brain, "large", "small"), registry)
//!     .with_resumable_streams(Arc::new(ResumableStreams::new()));
//!
//! let turn = service
//!     .submit_turn(&Session::regular("user-1"), TurnRequest::new("chat-1", message))
//!     .await?;
//! let mut events = turn.events;
//! while let Some(event) = events.next().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```

mod entitlements;
mod error;
mod events;
mod model_selection;
mod persistence;
mod resumable;
mod service;
mod step_loop;
mod store;

pub use entitlements::{Entitlements, Session, UserType, RATE_LIMIT_WINDOW_HOURS};
pub use error::ChatError;
pub use events::{
    EventEmitter, EventSink, StreamEvent, WordChunker, GENERIC_ERROR_TEXT, TIMEOUT_ERROR_TEXT,
};
pub use model_selection::{
    ModelCatalog, ModelDescriptor, ModelInfo, TitleModel, DEFAULT_CHAT_MODEL, REASONING_CHAT_MODEL,
};
pub use persistence::{fallback_title, PersistenceCoordinator, DEFAULT_CHAT_TITLE};
pub use resumable::{EventStream, ResumableStreams, StreamPublisher, DEFAULT_STREAM_TTL};
pub use service::{
    ChatService, ChatServiceConfig, TurnRequest, TurnStream, ACCEPTED_MEDIA_TYPES,
    DEFAULT_TURN_TIMEOUT, MAX_MESSAGE_CHARS, STOPPED_BY_USER,
};
pub use step_loop::{LoopState, StepLoop, StepLoopError, TurnOutcome, MAX_STEPS};
pub use store::{AccountCredentials, ChatStore, StoredMessage};
