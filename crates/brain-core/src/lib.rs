//! Core traits and types for Parley model backends.
//!
//! This crate provides the shared interface between model backends and the
//! chat orchestrator. It defines:
//!
//! - [`Brain`] - The trait every model backend implements (streaming output)
//! - [`ChatMessage`] / [`MessagePart`] - Messages as stored and streamed
//! - [`ToolSpec`] / [`ToolCall`] - The function-calling contract
//! - [`ExtractReasoning`] - `<think>` tag extraction for reasoning models
//! - [`BrainError`] - Error types for backend operations

mod error;
mod message;
mod prompt;
mod reasoning;
mod tools;
mod trait_def;
mod usage;

pub use error::BrainError;
pub use message::{ChatMessage, MessagePart, Role};
pub use prompt::{clean_title, DEFAULT_SYSTEM_PROMPT, MAX_TITLE_CHARS, TITLE_SYSTEM_PROMPT};
pub use reasoning::{ExtractReasoning, Segment, TagExtractor, DEFAULT_REASONING_TAG};
pub use tools::{ToolCall, ToolSpec};
pub use trait_def::{Brain, BrainEvent, BrainStream, Completion, CompletionRequest, FinishReason};
pub use usage::Usage;

// Re-export async_trait for convenience
pub use async_trait::async_trait;
