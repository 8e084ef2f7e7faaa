//! Mistral-backed brain implementation.
//!
//! This crate provides a [`Brain`] that streams chat completions from
//! Mistral's API (or any OpenAI-compatible endpoint) with function calling.
//!
//! # Features
//!
//! - Server-sent event streaming via `reqwest-eventsource`
//! - Function calling with tool call fragments assembled across chunks
//! - Token usage reporting on the final event
//! - Configurable via environment variables
//!
//! # Usage
//!
//! ```rust,no_run
//! use mistral_brain::{Brain, CompletionRequest, ChatMessage, MistralBrain};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let brain = MistralBrain::from_env()?;
//!     let request = CompletionRequest::new("", vec![ChatMessage::user("m1", "Hello!")]);
//!     let completion = brain.complete(request).await?;
//!     println!("{}", completion.text);
//!     Ok(())
//! }
//! ```

mod api_types;
mod brain;
mod config;

pub use brain::MistralBrain;
pub use config::{MistralBrainConfig, MistralBrainConfigBuilder};

// Re-export brain-core types for convenience
pub use brain_core::{async_trait, Brain, BrainError, ChatMessage, CompletionRequest};
