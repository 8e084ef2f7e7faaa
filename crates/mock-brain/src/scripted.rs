//! Scripted brain implementation - replays canned responses in order.

use std::collections::VecDeque;

use async_trait::async_trait;
use brain_core::{
    Brain, BrainError, BrainEvent, BrainStream, CompletionRequest, FinishReason, ToolCall, Usage,
};
use futures::stream;
use tokio::sync::Mutex;

/// One canned model invocation.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Stream these events.
    Events(Vec<BrainEvent>),
    /// Fail before streaming starts.
    Error(BrainError),
    /// Stream these events, then fail mid-stream.
    FailAfter(Vec<BrainEvent>, BrainError),
}

/// A brain that answers each invocation with the next scripted response.
///
/// Every request is recorded so tests can inspect what the model was sent.
/// Once the script runs out, invocations fail.
///
/// # Example
///
/// ```rust
/// use mock_brain::ScriptedBrain;
///
/// let brain = ScriptedBrain::new()
///     .then_text("Let me check the weather.")
///     .then_text("It is sunny.");
/// ```
#[derive(Debug, Default)]
pub struct ScriptedBrain {
    script: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBrain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw response.
    pub fn then(mut self, response: ScriptedResponse) -> Self {
        self.script.get_mut().push_back(response);
        self
    }

    /// Append a plain text answer.
    pub fn then_text(self, text: impl Into<String>) -> Self {
        let text = text.into();
        let usage = Usage::new(10, text.split_whitespace().count() as u32);
        self.then(ScriptedResponse::Events(vec![
            BrainEvent::TextDelta(text),
            BrainEvent::Finish {
                usage,
                reason: FinishReason::Stop,
            },
        ]))
    }

    /// Append a response that requests tool calls.
    pub fn then_tool_calls(self, calls: Vec<ToolCall>) -> Self {
        let mut events: Vec<BrainEvent> = calls.into_iter().map(BrainEvent::ToolCall).collect();
        events.push(BrainEvent::Finish {
            usage: Usage::new(10, 5),
            reason: FinishReason::ToolCalls,
        });
        self.then(ScriptedResponse::Events(events))
    }

    /// Append a response that fails before streaming.
    pub fn then_error(self, error: BrainError) -> Self {
        self.then(ScriptedResponse::Error(error))
    }

    /// Append a response that streams `events` and then fails.
    pub fn then_fail_after(self, events: Vec<BrainEvent>, error: BrainError) -> Self {
        self.then(ScriptedResponse::FailAfter(events, error))
    }

    /// Requests received so far.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of invocations so far.
    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Scripted responses not yet consumed.
    pub async fn remaining(&self) -> usize {
        self.script.lock().await.len()
    }
}

#[async_trait]
impl Brain for ScriptedBrain {
    async fn stream(&self, request: CompletionRequest) -> Result<BrainStream, BrainError> {
        self.requests.lock().await.push(request);

        let next = self.script.lock().await.pop_front();
        match next {
            Some(ScriptedResponse::Events(events)) => {
                Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
            }
            Some(ScriptedResponse::Error(error)) => Err(error),
            Some(ScriptedResponse::FailAfter(events, error)) => {
                let items: Vec<Result<BrainEvent, BrainError>> = events
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(error)))
                    .collect();
                Ok(Box::pin(stream::iter(items)))
            }
            None => Err(BrainError::ProcessingFailed(
                "ScriptedBrain script exhausted".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "ScriptedBrain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brain_core::ChatMessage;
    use futures::StreamExt;
    use serde_json::json;

    fn request() -> CompletionRequest {
        CompletionRequest::new("scripted", vec![ChatMessage::user("u1", "hi")])
    }

    #[tokio::test]
    async fn test_responses_replay_in_order() {
        let brain = ScriptedBrain::new()
            .then_tool_calls(vec![ToolCall::new("c1", "getWeather", json!({"location": "Paris"}))])
            .then_text("Sunny");

        let first = brain.complete(request()).await.unwrap();
        assert_eq!(first.tool_calls.len(), 1);
        assert_eq!(first.finish_reason, Some(FinishReason::ToolCalls));

        let second = brain.complete(request()).await.unwrap();
        assert_eq!(second.text, "Sunny");

        assert!(brain.complete(request()).await.is_err());
        assert_eq!(brain.call_count().await, 3);
        assert_eq!(brain.remaining().await, 0);
    }

    #[tokio::test]
    async fn test_fail_after_streams_then_errors() {
        let brain = ScriptedBrain::new().then_fail_after(
            vec![BrainEvent::TextDelta("partial".to_string())],
            BrainError::Network("connection reset".to_string()),
        );

        let mut stream = brain.stream(request()).await.unwrap();
        assert!(matches!(stream.next().await, Some(Ok(BrainEvent::TextDelta(_)))));
        assert!(matches!(stream.next().await, Some(Err(BrainError::Network(_)))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_error_before_streaming() {
        let brain = ScriptedBrain::new().then_error(BrainError::Api {
            status: 500,
            message: "boom".to_string(),
        });
        assert!(brain.stream(request()).await.is_err());
        assert_eq!(brain.requests().await[0].model, "scripted");
    }
}
