//! Chat message and part types shared by brains, the orchestrator and storage.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Parse a stored role string.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed part of a message.
///
/// Parts serialize with a `type` tag (`text`, `reasoning`, `tool-call`,
/// `tool-result`, `file`) so they can be stored and sent to clients as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    /// Visible answer text.
    Text { text: String },

    /// Model reasoning shown separately from the answer.
    Reasoning { text: String },

    /// A tool invocation requested by the model.
    ToolCall {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        input: Value,
    },

    /// The outcome of a tool invocation.
    ToolResult {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        output: Value,
        #[serde(rename = "isError", default)]
        is_error: bool,
    },

    /// Reference to an uploaded file.
    File {
        url: String,
        #[serde(rename = "mediaType")]
        media_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        MessagePart::Text { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        MessagePart::Reasoning { text: text.into() }
    }

    /// The tool call id, for `tool-call` and `tool-result` parts.
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            MessagePart::ToolCall { tool_call_id, .. }
            | MessagePart::ToolResult { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }
}

/// A chat message: a role plus an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub parts: Vec<MessagePart>,
    /// Creation time in unix milliseconds.
    #[serde(default)]
    pub created_at: i64,
}

impl ChatMessage {
    pub fn new(id: impl Into<String>, role: Role, parts: Vec<MessagePart>) -> Self {
        Self {
            id: id.into(),
            role,
            parts,
            created_at: 0,
        }
    }

    /// Create a single-text user message.
    pub fn user(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, Role::User, vec![MessagePart::text(text)])
    }

    /// Create a single-text assistant message.
    pub fn assistant(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, Role::Assistant, vec![MessagePart::text(text)])
    }

    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    /// Concatenated text of all `text` parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool call ids of every `tool-call` part that has no matching `tool-result`.
    pub fn dangling_tool_calls(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::ToolCall { tool_call_id, .. } => Some(tool_call_id.as_str()),
                _ => None,
            })
            .filter(|id| {
                !self.parts.iter().any(|part| {
                    matches!(part, MessagePart::ToolResult { tool_call_id, .. } if tool_call_id == id)
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_part_serialization_uses_kebab_tags() {
        let part = MessagePart::ToolCall {
            tool_call_id: "call-1".to_string(),
            tool_name: "getWeather".to_string(),
            input: json!({"location": "Paris"}),
        };
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["type"], "tool-call");
        assert_eq!(value["toolCallId"], "call-1");
        assert_eq!(value["toolName"], "getWeather");
    }

    #[test]
    fn test_tool_result_defaults_is_error() {
        let part: MessagePart = serde_json::from_value(json!({
            "type": "tool-result",
            "toolCallId": "call-1",
            "toolName": "getWeather",
            "output": {"temp": 20}
        }))
        .unwrap();
        assert!(matches!(part, MessagePart::ToolResult { is_error: false, .. }));
    }

    #[test]
    fn test_message_text_joins_text_parts() {
        let message = ChatMessage::new(
            "m1",
            Role::Assistant,
            vec![
                MessagePart::text("Hello "),
                MessagePart::reasoning("thinking"),
                MessagePart::text("world"),
            ],
        );
        assert_eq!(message.text(), "Hello world");
    }

    #[test]
    fn test_dangling_tool_calls() {
        let message = ChatMessage::new(
            "m1",
            Role::Assistant,
            vec![
                MessagePart::ToolCall {
                    tool_call_id: "a".to_string(),
                    tool_name: "getWeather".to_string(),
                    input: json!({}),
                },
                MessagePart::ToolCall {
                    tool_call_id: "b".to_string(),
                    tool_name: "getWeather".to_string(),
                    input: json!({}),
                },
                MessagePart::ToolResult {
                    tool_call_id: "a".to_string(),
                    tool_name: "getWeather".to_string(),
                    output: json!({}),
                    is_error: false,
                },
            ],
        );
        assert_eq!(message.dangling_tool_calls(), vec!["b"]);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("tool"), None);
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }
}
