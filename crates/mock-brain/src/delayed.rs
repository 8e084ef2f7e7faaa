//! Delayed brain implementation - wraps another brain with artificial delay.

use std::time::Duration;

use brain_core::{async_trait, Brain, BrainError, BrainStream, CompletionRequest};
use futures::StreamExt;
use tokio::time::sleep;

/// A brain that wraps another brain and adds artificial delay.
///
/// Useful for testing timeout and cancellation handling and simulating model
/// latency. The start delay applies before the stream opens; the event delay
/// applies before every streamed event.
pub struct DelayedBrain<B: Brain> {
    inner: B,
    delay: Duration,
    event_delay: Duration,
}

impl<B: Brain> DelayedBrain<B> {
    /// Create a new DelayedBrain wrapping the given brain with the specified delay.
    pub fn new(inner: B, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            event_delay: Duration::ZERO,
        }
    }

    /// Create a brain with a delay in milliseconds.
    pub fn with_millis(inner: B, millis: u64) -> Self {
        Self::new(inner, Duration::from_millis(millis))
    }

    /// Create a brain with a delay in seconds.
    pub fn with_secs(inner: B, secs: u64) -> Self {
        Self::new(inner, Duration::from_secs(secs))
    }

    /// Also delay every streamed event.
    pub fn with_event_delay(mut self, delay: Duration) -> Self {
        self.event_delay = delay;
        self
    }
}

#[async_trait]
impl<B: Brain> Brain for DelayedBrain<B> {
    async fn stream(&self, request: CompletionRequest) -> Result<BrainStream, BrainError> {
        sleep(self.delay).await;
        let inner = self.inner.stream(request).await?;

        if self.event_delay.is_zero() {
            return Ok(inner);
        }

        let event_delay = self.event_delay;
        Ok(Box::pin(inner.then(move |event| async move {
            sleep(event_delay).await;
            event
        })))
    }

    fn name(&self) -> &str {
        "DelayedBrain"
    }

    async fn is_ready(&self) -> bool {
        self.inner.is_ready().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EchoBrain;
    use brain_core::ChatMessage;
    use std::time::Instant;

    #[tokio::test]
    async fn test_delayed_brain() {
        let brain = DelayedBrain::with_millis(EchoBrain::new(), 100)
            .with_event_delay(Duration::from_millis(10));

        let start = Instant::now();
        let completion = brain
            .complete(CompletionRequest::new("echo", vec![ChatMessage::user("u1", "test")]))
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(completion.text, "test");
        assert!(elapsed >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_brain_name() {
        let brain = DelayedBrain::with_millis(EchoBrain::new(), 0);
        assert_eq!(brain.name(), "DelayedBrain");
    }
}
