//! MistralBrain implementation using the streaming chat completions API.

use std::collections::{HashSet, VecDeque};

use brain_core::{
    async_trait, Brain, BrainError, BrainEvent, BrainStream, ChatMessage, CompletionRequest,
    FinishReason, MessagePart, Role, ToolCall, Usage,
};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use reqwest_eventsource::retry::Never;
use reqwest_eventsource::{Event, EventSource, RequestBuilderExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api_types::{
    ApiError, ApiFunction, ApiMessage, ApiTool, ApiToolCall, ChatCompletionRequest, StreamChunk,
    ToolCallDelta,
};
use crate::config::MistralBrainConfig;

/// A brain backed by Mistral's OpenAI-compatible chat completions API.
///
/// Every invocation is a streaming request. Text arrives as
/// [`BrainEvent::TextDelta`]s; tool calls are assembled from their fragments
/// and emitted once the response is complete, followed by
/// [`BrainEvent::Finish`].
pub struct MistralBrain {
    client: Client,
    config: MistralBrainConfig,
}

impl MistralBrain {
    /// Create a new MistralBrain with the given configuration.
    pub fn new(config: MistralBrainConfig) -> Result<Self, BrainError> {
        let client = Client::builder()
            .build()
            .map_err(|e| BrainError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "MistralBrain initialized with chat model: {}, title model: {}",
            config.chat_model, config.title_model
        );

        Ok(Self { client, config })
    }

    /// Create a MistralBrain from environment variables.
    ///
    /// See [`MistralBrainConfig::from_env`] for required environment variables.
    pub fn from_env() -> Result<Self, BrainError> {
        Self::new(MistralBrainConfig::from_env()?)
    }

    /// Get the configuration.
    pub fn config(&self) -> &MistralBrainConfig {
        &self.config
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatCompletionRequest {
        let model = if request.model.is_empty() {
            self.config.chat_model.clone()
        } else {
            request.model.clone()
        };

        let tools: Vec<ApiTool> = request
            .tools
            .iter()
            .map(|spec| ApiTool {
                tool_type: "function".to_string(),
                function: ApiFunction {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    parameters: spec.input_schema.clone(),
                },
            })
            .collect();

        ChatCompletionRequest {
            model,
            messages: to_api_messages(request.system.as_deref(), &request.messages),
            stream: true,
            max_tokens: request.max_tokens.or(self.config.max_tokens),
            temperature: request.temperature.or(self.config.temperature),
            tool_choice: (!tools.is_empty()).then(|| "auto".to_string()),
            tools,
        }
    }
}

/// Convert chat history into API messages.
///
/// Assistant messages are split at tool results: the text and tool calls
/// before a batch of results become one assistant message, each result
/// becomes a `tool` message. Reasoning parts are not sent back, and tool
/// calls without a result are dropped.
pub(crate) fn to_api_messages(system: Option<&str>, messages: &[ChatMessage]) -> Vec<ApiMessage> {
    let mut out = Vec::new();

    if let Some(system) = system.filter(|s| !s.trim().is_empty()) {
        out.push(ApiMessage::system(system));
    }

    for message in messages {
        match message.role {
            Role::System => out.push(ApiMessage::system(message.text())),
            Role::User => out.push(ApiMessage::user(user_content(message))),
            Role::Assistant => push_assistant(&mut out, message),
        }
    }

    out
}

fn user_content(message: &ChatMessage) -> String {
    let mut content = message.text();
    for part in &message.parts {
        if let MessagePart::File { url, name, .. } = part {
            if !content.is_empty() {
                content.push('\n');
            }
            content.push_str(&format!("[Attachment: {}]", name.as_deref().unwrap_or(url)));
        }
    }
    content
}

fn push_assistant(out: &mut Vec<ApiMessage>, message: &ChatMessage) {
    let answered: HashSet<&str> = message
        .parts
        .iter()
        .filter_map(|part| match part {
            MessagePart::ToolResult { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        })
        .collect();

    let mut text = String::new();
    let mut calls = Vec::new();
    let mut results = Vec::new();

    for part in &message.parts {
        match part {
            MessagePart::Text { text: delta } => {
                if !results.is_empty() {
                    flush_assistant(out, &mut text, &mut calls, &mut results);
                }
                text.push_str(delta);
            }
            MessagePart::ToolCall {
                tool_call_id,
                tool_name,
                input,
            } if answered.contains(tool_call_id.as_str()) => {
                if !results.is_empty() {
                    flush_assistant(out, &mut text, &mut calls, &mut results);
                }
                calls.push(ApiToolCall::function(
                    tool_call_id.clone(),
                    tool_name.clone(),
                    input.to_string(),
                ));
            }
            MessagePart::ToolResult {
                tool_call_id,
                tool_name,
                output,
                ..
            } => {
                let content = match output {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                results.push(ApiMessage::tool(tool_call_id.clone(), tool_name.clone(), content));
            }
            _ => {}
        }
    }

    flush_assistant(out, &mut text, &mut calls, &mut results);
}

fn flush_assistant(
    out: &mut Vec<ApiMessage>,
    text: &mut String,
    calls: &mut Vec<ApiToolCall>,
    results: &mut Vec<ApiMessage>,
) {
    if !text.is_empty() || !calls.is_empty() {
        out.push(ApiMessage::assistant(
            std::mem::take(text),
            std::mem::take(calls),
        ));
    }
    out.append(results);
}

/// A tool call being assembled from streamed fragments.
#[derive(Debug, Default)]
struct PartialCall {
    index: Option<usize>,
    id: String,
    name: String,
    arguments: String,
}

/// Collects tool call fragments across chunks.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    calls: Vec<PartialCall>,
}

impl ToolCallAccumulator {
    fn push(&mut self, delta: ToolCallDelta) {
        let slot = match (delta.index, delta.id.as_deref()) {
            (Some(index), _) => self.calls.iter().position(|c| c.index == Some(index)),
            (None, Some(id)) => self.calls.iter().position(|c| c.id == id),
            (None, None) => self.calls.len().checked_sub(1),
        };

        let call = match slot {
            Some(slot) => &mut self.calls[slot],
            None => {
                self.calls.push(PartialCall {
                    index: delta.index,
                    ..Default::default()
                });
                let last = self.calls.len() - 1;
                &mut self.calls[last]
            }
        };

        if let Some(id) = delta.id.filter(|id| !id.is_empty()) {
            call.id = id;
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name.filter(|n| !n.is_empty()) {
                call.name = name;
            }
            if let Some(arguments) = function.arguments {
                call.arguments.push_str(&arguments);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Finished tool calls, in the order the model started them.
    ///
    /// Arguments that are not valid JSON are passed through as a string so
    /// that validation reports them back to the model.
    fn drain(&mut self) -> Vec<ToolCall> {
        self.calls
            .drain(..)
            .enumerate()
            .map(|(i, call)| {
                let id = if call.id.is_empty() {
                    format!("call_{}", i)
                } else {
                    call.id
                };
                match ToolCall::from_json(id.clone(), call.name.clone(), &call.arguments) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        warn!(tool = %call.name, error = %e, "Tool call arguments are not valid JSON");
                        ToolCall::new(id, call.name, Value::String(call.arguments))
                    }
                }
            })
            .collect()
    }
}

struct DecodeState {
    source: EventSource,
    tool_calls: ToolCallAccumulator,
    usage: Usage,
    finish_reason: Option<FinishReason>,
    pending: VecDeque<Result<BrainEvent, BrainError>>,
    done: bool,
}

impl DecodeState {
    fn apply(&mut self, chunk: StreamChunk) {
        for choice in chunk.choices {
            if let Some(text) = choice.delta.text() {
                self.pending.push_back(Ok(BrainEvent::TextDelta(text)));
            }
            for delta in choice.delta.tool_calls {
                self.tool_calls.push(delta);
            }
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(FinishReason::from_provider(&reason));
            }
        }
        if let Some(usage) = chunk.usage {
            self.usage = Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            };
        }
    }

    fn finish(&mut self) {
        self.source.close();
        let reason = self.finish_reason.unwrap_or(if self.tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        });
        for call in self.tool_calls.drain() {
            self.pending.push_back(Ok(BrainEvent::ToolCall(call)));
        }
        debug!(
            ?reason,
            total_tokens = self.usage.total_tokens,
            "Mistral stream finished"
        );
        self.pending.push_back(Ok(BrainEvent::Finish {
            usage: self.usage,
            reason,
        }));
        self.done = true;
    }

    fn fail(&mut self, error: BrainError) {
        self.source.close();
        self.pending.push_back(Err(error));
        self.done = true;
    }
}

fn decode_stream(source: EventSource) -> BrainStream {
    let state = DecodeState {
        source,
        tool_calls: ToolCallAccumulator::default(),
        usage: Usage::default(),
        finish_reason: None,
        pending: VecDeque::new(),
        done: false,
    };

    let stream = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }

            match state.source.next().await {
                Some(Ok(Event::Open)) => {}
                Some(Ok(Event::Message(message))) => {
                    if message.data.trim() == "[DONE]" {
                        state.finish();
                        continue;
                    }
                    match serde_json::from_str::<StreamChunk>(&message.data) {
                        Ok(chunk) => state.apply(chunk),
                        Err(e) => state.fail(BrainError::ProcessingFailed(format!(
                            "Failed to parse stream chunk: {}",
                            e
                        ))),
                    }
                }
                Some(Err(reqwest_eventsource::Error::StreamEnded)) | None => state.finish(),
                Some(Err(e)) => {
                    let error = map_stream_error(e).await;
                    state.fail(error);
                }
            }
        }
    });

    Box::pin(stream)
}

async fn map_stream_error(error: reqwest_eventsource::Error) -> BrainError {
    match error {
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            BrainError::Api {
                status: status.as_u16(),
                message: ApiError::message_from(&body),
            }
        }
        reqwest_eventsource::Error::Transport(e) => {
            BrainError::Network(format!("Failed to send request: {}", e))
        }
        other => BrainError::ProcessingFailed(other.to_string()),
    }
}

#[async_trait]
impl Brain for MistralBrain {
    async fn stream(&self, request: CompletionRequest) -> Result<BrainStream, BrainError> {
        let body = self.build_request(&request);

        debug!(
            model = %body.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Sending streaming request to Mistral"
        );

        let mut source = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .eventsource()
            .map_err(|e| BrainError::Configuration(format!("Failed to build request: {}", e)))?;
        source.set_retry_policy(Box::new(Never));

        // Surface HTTP errors from the call itself rather than mid-stream.
        match source.next().await {
            Some(Ok(Event::Open)) => Ok(decode_stream(source)),
            Some(Ok(Event::Message(_))) => Err(BrainError::ProcessingFailed(
                "Stream produced data before opening".to_string(),
            )),
            Some(Err(e)) => {
                source.close();
                Err(map_stream_error(e).await)
            }
            None => Err(BrainError::Network("Stream closed before opening".to_string())),
        }
    }

    fn name(&self) -> &str {
        "MistralBrain"
    }

    async fn is_ready(&self) -> bool {
        !self.config.api_key.is_empty()
    }
}
