//! Mock brain implementations for the Parley chat engine.
//!
//! This crate provides mock implementations of the `Brain` trait for testing:
//! - `EchoBrain` - Echoes the last user message back
//! - `ScriptedBrain` - Replays canned responses, including tool calls and failures
//! - `DelayedBrain` - Wraps another brain with artificial delay
//!
//! For production AI processing, use the `mistral-brain` crate instead.
//!
//! # Example
//!
//! ```rust
//! use mock_brain::{Brain, ChatMessage, CompletionRequest, EchoBrain};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mock_brain::BrainError> {
//!     let brain = EchoBrain::new();
//!
//!     let request = CompletionRequest::new("echo", vec![ChatMessage::user("m1", "Hello!")]);
//!
//!     let completion = brain.complete(request).await?;
//!     println!("Response: {}", completion.text);
//!     Ok(())
//! }
//! ```

// Mock implementations
mod delayed;
mod echo;
mod scripted;

// Re-export brain-core types for convenience
pub use brain_core::{
    async_trait, Brain, BrainError, BrainEvent, ChatMessage, CompletionRequest, FinishReason,
    ToolCall, Usage,
};

// Export mock implementations
pub use delayed::DelayedBrain;
pub use echo::EchoBrain;
pub use scripted::{ScriptedBrain, ScriptedResponse};
