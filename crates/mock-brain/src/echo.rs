//! Echo brain implementation - echoes the last user message back.

use async_trait::async_trait;
use brain_core::{
    Brain, BrainError, BrainEvent, BrainStream, CompletionRequest, FinishReason, Role, Usage,
};
use futures::stream;

/// A simple brain that echoes the latest user message.
///
/// Useful for testing the turn flow without any AI processing. Usage counts
/// words rather than tokens.
#[derive(Debug, Clone, Default)]
pub struct EchoBrain {
    /// Optional prefix to add before the echo.
    prefix: Option<String>,
}

impl EchoBrain {
    /// Create a new EchoBrain with no prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new EchoBrain with a custom prefix.
    ///
    /// # Example
    ///
    /// ```rust
    /// use mock_brain::EchoBrain;
    ///
    /// let brain = EchoBrain::with_prefix("Echo: ");
    /// // Will respond with "Echo: <original message>"
    /// ```
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn reply_to(&self, request: &CompletionRequest) -> String {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.text())
            .unwrap_or_default();

        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, last_user),
            None => last_user,
        }
    }
}

fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

#[async_trait]
impl Brain for EchoBrain {
    async fn stream(&self, request: CompletionRequest) -> Result<BrainStream, BrainError> {
        let reply = self.reply_to(&request);
        let prompt_words: u32 = request.messages.iter().map(|m| word_count(&m.text())).sum();
        let usage = Usage::new(prompt_words, word_count(&reply));

        let events = vec![
            Ok(BrainEvent::TextDelta(reply)),
            Ok(BrainEvent::Finish {
                usage,
                reason: FinishReason::Stop,
            }),
        ];
        Ok(Box::pin(stream::iter(events)))
    }

    fn name(&self) -> &str {
        "EchoBrain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brain_core::ChatMessage;

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest::new(
            "echo",
            vec![
                ChatMessage::user("u0", "earlier"),
                ChatMessage::assistant("a0", "reply"),
                ChatMessage::user("u1", text),
            ],
        )
    }

    #[tokio::test]
    async fn test_echo_no_prefix() {
        let brain = EchoBrain::new();
        let completion = brain.complete(request("Hello there!")).await.unwrap();
        assert_eq!(completion.text, "Hello there!");
        assert_eq!(completion.usage.completion_tokens, 2);
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn test_echo_with_prefix() {
        let brain = EchoBrain::with_prefix("Echo: ");
        let completion = brain.complete(request("Hello!")).await.unwrap();
        assert_eq!(completion.text, "Echo: Hello!");
    }

    #[tokio::test]
    async fn test_brain_name() {
        let brain = EchoBrain::new();
        assert_eq!(brain.name(), "EchoBrain");
        assert!(brain.is_ready().await);
    }
}
