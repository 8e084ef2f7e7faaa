//! The `Brain` trait implemented by every model backend.

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::BrainError;
use crate::message::ChatMessage;
use crate::tools::{ToolCall, ToolSpec};
use crate::usage::Usage;

/// Why a model invocation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    Other,
}

impl FinishReason {
    /// Map an OpenAI-style `finish_reason` string.
    pub fn from_provider(value: &str) -> Self {
        match value {
            "stop" => FinishReason::Stop,
            "tool_calls" => FinishReason::ToolCalls,
            "length" | "model_length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Other,
        }
    }
}

/// Incremental output of one model invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum BrainEvent {
    /// A chunk of visible answer text.
    TextDelta(String),
    /// A chunk of reasoning text.
    ReasoningDelta(String),
    /// A complete tool call request.
    ToolCall(ToolCall),
    /// End of the invocation. Always the last event of a well-formed stream.
    Finish { usage: Usage, reason: FinishReason },
}

/// Stream of events for one model invocation.
pub type BrainStream = Pin<Box<dyn Stream<Item = Result<BrainEvent, BrainError>> + Send>>;

/// Input to one model invocation.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// Backend model name.
    pub model: String,
    /// System prompt.
    pub system: Option<String>,
    /// Conversation so far, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Tools the model may call. Empty disables function calling.
    pub tools: Vec<ToolSpec>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

/// A fully materialized model response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub reasoning: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    /// Fold one event into the completion.
    pub fn apply(&mut self, event: BrainEvent) {
        match event {
            BrainEvent::TextDelta(delta) => self.text.push_str(&delta),
            BrainEvent::ReasoningDelta(delta) => self.reasoning.push_str(&delta),
            BrainEvent::ToolCall(call) => self.tool_calls.push(call),
            BrainEvent::Finish { usage, reason } => {
                self.usage = usage;
                self.finish_reason = Some(reason);
            }
        }
    }
}

/// A language model backend.
///
/// Implementations stream their output as [`BrainEvent`]s. The orchestrator
/// drives tool execution; a brain only reports which tools the model wants.
///
/// # Example
///
/// ```rust
/// use brain_core::{async_trait, Brain, BrainError, BrainEvent, BrainStream, CompletionRequest, FinishReason, Usage};
///
/// struct HelloBrain;
///
/// #[async_trait]
/// impl Brain for HelloBrain {
///     async fn stream(&self, _request: CompletionRequest) -> Result<BrainStream, BrainError> {
///         let events = vec![
///             Ok(BrainEvent::TextDelta("Hello!".to_string())),
///             Ok(BrainEvent::Finish { usage: Usage::default(), reason: FinishReason::Stop }),
///         ];
///         Ok(Box::pin(futures::stream::iter(events)))
///     }
///
///     fn name(&self) -> &str {
///         "HelloBrain"
///     }
/// }
/// ```
#[async_trait]
pub trait Brain: Send + Sync {
    /// Start one model invocation and stream its output.
    async fn stream(&self, request: CompletionRequest) -> Result<BrainStream, BrainError>;

    /// Run one invocation to completion and collect the result.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, BrainError> {
        let mut stream = self.stream(request).await?;
        let mut completion = Completion::default();
        while let Some(event) = stream.next().await {
            completion.apply(event?);
        }
        Ok(completion)
    }

    /// Name used in logs.
    fn name(&self) -> &str;

    /// Whether the backend is ready to serve requests.
    async fn is_ready(&self) -> bool {
        true
    }
}
