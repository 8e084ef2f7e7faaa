//! Step loop controller.
//!
//! Drives one turn: invoke the model, run the tools it asks for, feed the
//! results back, and repeat until the model answers without tool calls or
//! the step bound is reached.
//!
//! ```text
//! AwaitingModel -> ModelResponded -> ExecutingTools -> AwaitingModel
//!                                 -> Terminal
//!               -> Error
//! ```
//!
//! Tool failures never end the loop: they become error tool-results that the
//! model sees on its next invocation. Model failures move the loop to
//! `Error` and nothing of the turn is returned for persistence.

use std::sync::Arc;

use agent_tools::{ToolContext, ToolRegistry};
use brain_core::{
    Brain, BrainError, BrainEvent, ChatMessage, Completion, CompletionRequest, FinishReason,
    MessagePart, Role, ToolCall, ToolSpec, Usage,
};
use futures::future::join_all;
use futures::StreamExt;
use serde_json::{json, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::EventEmitter;

/// Maximum model invocations per turn.
pub const MAX_STEPS: usize = 5;

/// Step loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingModel,
    ModelResponded,
    ExecutingTools,
    Terminal,
    Error,
}

/// Why a turn ended without a final answer.
#[derive(Debug, Error)]
pub enum StepLoopError {
    /// The model backend failed.
    #[error("model invocation failed: {0}")]
    Model(#[from] BrainError),

    /// The turn was cancelled.
    #[error("turn cancelled")]
    Cancelled,
}

/// The materialized assistant turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Final parts of the assistant message, in generation order.
    pub parts: Vec<MessagePart>,
    /// Usage summed over every invocation of the turn, not only the final
    /// step. This total is the snapshot written to the chat.
    pub usage: Usage,
    /// Number of model invocations.
    pub steps: usize,
    pub finish_reason: Option<FinishReason>,
}

/// Runs the bounded generation loop for one turn.
pub struct StepLoop {
    brain: Arc<dyn Brain>,
    model: String,
    system: Option<String>,
    tools: ToolRegistry,
    context: ToolContext,
    max_steps: usize,
    cancel: CancellationToken,
}

impl StepLoop {
    pub fn new(
        brain: Arc<dyn Brain>,
        model: impl Into<String>,
        tools: ToolRegistry,
        context: ToolContext,
    ) -> Self {
        Self {
            brain,
            model: model.into(),
            system: None,
            tools,
            context,
            max_steps: MAX_STEPS,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Lower the invocation bound. Values above [`MAX_STEPS`] are clamped.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.clamp(1, MAX_STEPS);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the loop over `history`, which must end with the new user turn.
    pub async fn run(
        &self,
        history: Vec<ChatMessage>,
        emitter: &mut EventEmitter,
    ) -> Result<TurnOutcome, StepLoopError> {
        let specs = self.tools.specs();
        let mut state = LoopState::AwaitingModel;
        let mut parts: Vec<MessagePart> = Vec::new();
        let mut usage = Usage::default();

        info!(
            backend = %self.brain.name(),
            model = %self.model,
            tools = specs.len(),
            history = history.len(),
            "Starting step loop"
        );

        for step in 1..=self.max_steps {
            let request = self.request(&history, emitter.message_id(), &parts, &specs);
            let response = match self.invoke(request, emitter).await {
                Ok(response) => response,
                Err(err) => {
                    transition(&mut state, LoopState::Error, step);
                    return Err(err);
                }
            };
            transition(&mut state, LoopState::ModelResponded, step);

            usage += response.usage;
            push_generated_parts(&mut parts, &response);

            if response.tool_calls.is_empty() || step == self.max_steps {
                if !response.tool_calls.is_empty() {
                    warn!(
                        step,
                        dropped = response.tool_calls.len(),
                        "Step bound reached with pending tool calls"
                    );
                }
                transition(&mut state, LoopState::Terminal, step);
                return Ok(TurnOutcome {
                    parts,
                    usage,
                    steps: step,
                    finish_reason: response.finish_reason,
                });
            }

            transition(&mut state, LoopState::ExecutingTools, step);
            if let Err(err) = self.execute_tools(response.tool_calls, &mut parts, emitter).await {
                transition(&mut state, LoopState::Error, step);
                return Err(err);
            }
            transition(&mut state, LoopState::AwaitingModel, step);
        }

        Ok(TurnOutcome {
            parts,
            usage,
            steps: self.max_steps,
            finish_reason: None,
        })
    }

    fn request(
        &self,
        history: &[ChatMessage],
        message_id: &str,
        parts: &[MessagePart],
        specs: &[ToolSpec],
    ) -> CompletionRequest {
        let mut messages = history.to_vec();
        if !parts.is_empty() {
            messages.push(ChatMessage::new(message_id, Role::Assistant, parts.to_vec()));
        }

        let request = CompletionRequest::new(self.model.clone(), messages).with_tools(specs.to_vec());
        match &self.system {
            Some(system) => request.with_system(system.clone()),
            None => request,
        }
    }

    /// One model invocation, streaming deltas to the emitter as they arrive.
    async fn invoke(
        &self,
        request: CompletionRequest,
        emitter: &mut EventEmitter,
    ) -> Result<Completion, StepLoopError> {
        let mut stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(StepLoopError::Cancelled),
            stream = self.brain.stream(request) => stream?,
        };

        let mut completion = Completion::default();
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(StepLoopError::Cancelled),
                next = stream.next() => next,
            };

            let Some(event) = next else {
                break;
            };
            let event = event?;
            match &event {
                BrainEvent::TextDelta(delta) => emitter.text_delta(delta),
                BrainEvent::ReasoningDelta(delta) => emitter.reasoning_delta(delta),
                BrainEvent::ToolCall(_) | BrainEvent::Finish { .. } => {}
            }
            completion.apply(event);
        }

        emitter.close_part();
        debug!(
            text = completion.text.len(),
            reasoning = completion.reasoning.len(),
            tool_calls = completion.tool_calls.len(),
            "Model responded"
        );
        Ok(completion)
    }

    /// Run every call of one step concurrently; results are appended in call order.
    async fn execute_tools(
        &self,
        calls: Vec<ToolCall>,
        parts: &mut Vec<MessagePart>,
        emitter: &mut EventEmitter,
    ) -> Result<(), StepLoopError> {
        for call in &calls {
            emitter.tool_call(&call.id, &call.name, &call.arguments);
        }

        let executions = calls.iter().map(|call| self.execute_tool(call));
        let results = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(StepLoopError::Cancelled),
            results = join_all(executions) => results,
        };

        let mut tool_results = Vec::with_capacity(calls.len());
        for (call, (output, is_error)) in calls.into_iter().zip(results) {
            emitter.tool_result(&call.id, &call.name, &output, is_error);
            parts.push(MessagePart::ToolCall {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                input: call.arguments,
            });
            tool_results.push(MessagePart::ToolResult {
                tool_call_id: call.id,
                tool_name: call.name,
                output,
                is_error,
            });
        }
        parts.extend(tool_results);

        Ok(())
    }

    async fn execute_tool(&self, call: &ToolCall) -> (Value, bool) {
        match self
            .tools
            .execute(&call.name, &call.arguments, self.context.clone())
            .await
        {
            Ok(output) => (output.to_model_value(), false),
            Err(err) => {
                warn!(tool = %call.name, call_id = %call.id, error = %err, "Tool call failed");
                (json!({ "error": err.to_string() }), true)
            }
        }
    }
}

fn transition(state: &mut LoopState, next: LoopState, step: usize) {
    debug!(step, from = ?*state, to = ?next, "Step loop transition");
    *state = next;
}

/// Reasoning first, then text, one part each per step.
fn push_generated_parts(parts: &mut Vec<MessagePart>, response: &Completion) {
    if !response.reasoning.is_empty() {
        parts.push(MessagePart::reasoning(response.reasoning.clone()));
    }
    if !response.text.is_empty() {
        parts.push(MessagePart::text(response.text.clone()));
    }
}
