//! Typed stream events and the emitter that orders them.
//!
//! A turn produces a flat, append-only sequence of [`StreamEvent`]s. The
//! [`EventEmitter`] owns the ordering rules:
//!
//! - text and reasoning deltas are re-chunked on word boundaries;
//! - `data-usage` is emitted at most once and closes the sequence;
//! - at most one `error` or `abort` is emitted, and it closes the sequence;
//! - anything emitted after the sequence is closed is dropped.

use brain_core::Usage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

/// Text sent to clients when a turn fails mid-stream.
pub const GENERIC_ERROR_TEXT: &str = "Oops, an error occurred!";

/// Text sent to clients when a turn exceeds its wall-clock budget.
pub const TIMEOUT_ERROR_TEXT: &str = "Request timed out";

/// One event of a turn's output stream, serialized as `{"type": ..}` JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// First event of a turn; names the assistant message being generated.
    Start {
        #[serde(rename = "messageId")]
        message_id: String,
    },

    TextDelta { id: String, delta: String },

    ReasoningDelta { id: String, delta: String },

    ToolCall {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        input: Value,
    },

    ToolResult {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        output: Value,
        #[serde(rename = "isError")]
        is_error: bool,
    },

    /// Final usage of the turn. Last event of a successful turn.
    DataUsage { data: Usage },

    /// Terminal failure.
    Error {
        #[serde(rename = "errorText")]
        error_text: String,
    },

    /// Terminal user stop.
    Abort { reason: String },
}

impl StreamEvent {
    /// Whether this event ends the sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::DataUsage { .. } | StreamEvent::Error { .. } | StreamEvent::Abort { .. }
        )
    }

    /// The `type` tag, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Start { .. } => "start",
            StreamEvent::TextDelta { .. } => "text-delta",
            StreamEvent::ReasoningDelta { .. } => "reasoning-delta",
            StreamEvent::ToolCall { .. } => "tool-call",
            StreamEvent::ToolResult { .. } => "tool-result",
            StreamEvent::DataUsage { .. } => "data-usage",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Abort { .. } => "abort",
        }
    }
}

/// Where an emitter delivers events.
pub trait EventSink: Send {
    fn deliver(&mut self, event: StreamEvent);
}

impl EventSink for mpsc::UnboundedSender<StreamEvent> {
    fn deliver(&mut self, event: StreamEvent) {
        // Receiver is dropped once the client disconnects.
        let _ = self.send(event);
    }
}

/// Buffers streamed text and releases it one word at a time.
///
/// A released chunk is a run of non-whitespace followed by the whitespace
/// after it, so words are never split across deltas. Whatever is left when
/// the part ends is released by [`flush`](Self::flush).
#[derive(Debug, Default)]
pub struct WordChunker {
    buffer: String,
}

impl WordChunker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: &str) -> Vec<String> {
        self.buffer.push_str(delta);
        let mut chunks = Vec::new();
        while let Some(end) = next_word_end(&self.buffer) {
            chunks.push(self.buffer.drain(..end).collect());
        }
        chunks
    }

    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

/// Byte offset just past the first word and its trailing whitespace, if the
/// buffer holds a complete one.
fn next_word_end(text: &str) -> Option<usize> {
    let mut seen_word = false;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !c.is_whitespace() {
            seen_word = true;
            continue;
        }
        if seen_word {
            let mut end = idx + c.len_utf8();
            while let Some(&(next_idx, next)) = chars.peek() {
                if !next.is_whitespace() {
                    break;
                }
                end = next_idx + next.len_utf8();
                chars.next();
            }
            return Some(end);
        }
    }

    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartKind {
    Text,
    Reasoning,
}

struct OpenPart {
    kind: PartKind,
    id: String,
    chunker: WordChunker,
}

/// Turns step loop output into an ordered [`StreamEvent`] sequence.
pub struct EventEmitter {
    sink: Box<dyn EventSink>,
    message_id: String,
    open: Option<OpenPart>,
    next_part: usize,
    finished: bool,
}

impl EventEmitter {
    pub fn new(message_id: impl Into<String>, sink: Box<dyn EventSink>) -> Self {
        Self {
            sink,
            message_id: message_id.into(),
            open: None,
            next_part: 0,
            finished: false,
        }
    }

    /// Id of the assistant message this turn produces.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Whether a terminal event has been emitted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn start(&mut self) {
        let message_id = self.message_id.clone();
        self.emit(StreamEvent::Start { message_id });
    }

    pub fn text_delta(&mut self, delta: &str) {
        self.delta(PartKind::Text, delta);
    }

    pub fn reasoning_delta(&mut self, delta: &str) {
        self.delta(PartKind::Reasoning, delta);
    }

    /// Flush the open text or reasoning part.
    pub fn close_part(&mut self) {
        if let Some(mut part) = self.open.take() {
            if let Some(rest) = part.chunker.flush() {
                self.emit(delta_event(part.kind, &part.id, rest));
            }
        }
    }

    pub fn tool_call(&mut self, tool_call_id: &str, tool_name: &str, input: &Value) {
        self.close_part();
        self.emit(StreamEvent::ToolCall {
            tool_call_id: tool_call_id.to_string(),
            tool_name: tool_name.to_string(),
            input: input.clone(),
        });
    }

    pub fn tool_result(&mut self, tool_call_id: &str, tool_name: &str, output: &Value, is_error: bool) {
        self.close_part();
        self.emit(StreamEvent::ToolResult {
            tool_call_id: tool_call_id.to_string(),
            tool_name: tool_name.to_string(),
            output: output.clone(),
            is_error,
        });
    }

    /// Emit the final usage and close the sequence.
    pub fn usage(&mut self, usage: Usage) {
        self.close_part();
        self.emit(StreamEvent::DataUsage { data: usage });
    }

    /// Emit a terminal error. Buffered partial text is discarded.
    pub fn error(&mut self, error_text: impl Into<String>) {
        self.open = None;
        self.emit(StreamEvent::Error {
            error_text: error_text.into(),
        });
    }

    /// Emit a terminal abort. Buffered partial text is discarded.
    pub fn abort(&mut self, reason: impl Into<String>) {
        self.open = None;
        self.emit(StreamEvent::Abort {
            reason: reason.into(),
        });
    }

    fn delta(&mut self, kind: PartKind, delta: &str) {
        if self.open.as_ref().map(|part| part.kind) != Some(kind) {
            self.close_part();
            let id = format!("{}-{}", self.message_id, self.next_part);
            self.next_part += 1;
            self.open = Some(OpenPart {
                kind,
                id,
                chunker: WordChunker::new(),
            });
        }

        let Some(part) = self.open.as_mut() else {
            return;
        };
        let id = part.id.clone();
        let chunks = part.chunker.push(delta);
        for chunk in chunks {
            self.emit(delta_event(kind, &id, chunk));
        }
    }

    fn emit(&mut self, event: StreamEvent) {
        if self.finished {
            debug!(event = event.kind(), "Dropping event after terminal event");
            return;
        }
        if event.is_terminal() {
            self.finished = true;
        }
        self.sink.deliver(event);
    }
}

fn delta_event(kind: PartKind, id: &str, delta: String) -> StreamEvent {
    match kind {
        PartKind::Text => StreamEvent::TextDelta {
            id: id.to_string(),
            delta,
        },
        PartKind::Reasoning => StreamEvent::ReasoningDelta {
            id: id.to_string(),
            delta,
        },
    }
}
