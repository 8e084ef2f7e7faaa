//! Chat completions API request and response types (OpenAI-compatible).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message in the request conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    /// Role: "system", "user", "assistant" or "tool"
    pub role: String,
    /// Message content
    #[serde(default)]
    pub content: String,
    /// Tool calls made by the assistant
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ApiToolCall>,
    /// Call this tool message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name for tool messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ApiMessage {
    fn plain(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain("user", content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ApiToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::plain("assistant", content)
        }
    }

    /// Create a tool result message.
    pub fn tool(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::plain("tool", content)
        }
    }
}

/// A tool call inside an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: ApiFunctionCall,
}

impl ApiToolCall {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: String) -> Self {
        Self {
            id: id.into(),
            call_type: "function".to_string(),
            function: ApiFunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }
}

/// Function name and JSON-encoded arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiFunctionCall {
    pub name: String,
    pub arguments: String,
}

/// A function the model may call.
#[derive(Debug, Clone, Serialize)]
pub struct ApiTool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: ApiFunction,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Streaming chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    /// Model to use
    pub model: String,
    /// Messages in the conversation
    pub messages: Vec<ApiMessage>,
    /// Always true; responses are consumed as SSE
    pub stream: bool,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Tools to make available
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ApiTool>,
    /// "auto" when tools are present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

/// One SSE chunk of a streaming response.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Present on the final chunk
    #[serde(default)]
    pub usage: Option<ApiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    /// A string, or an array of typed chunks on some models
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallDelta>,
}

impl Delta {
    /// Visible text carried by this delta.
    pub fn text(&self) -> Option<String> {
        match self.content.as_ref()? {
            Value::String(text) if !text.is_empty() => Some(text.clone()),
            Value::Array(chunks) => {
                let text: String = chunks
                    .iter()
                    .filter(|chunk| chunk.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|chunk| chunk.get("text").and_then(Value::as_str))
                    .collect();
                (!text.is_empty()).then_some(text)
            }
            _ => None,
        }
    }
}

/// A fragment of a tool call. Arguments may arrive across several chunks.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ApiUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<ApiErrorDetails>,
}

/// API error details.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetails {
    pub message: String,
}

impl ApiError {
    /// Best-effort human readable message from an error body.
    pub fn message_from(body: &str) -> String {
        match serde_json::from_str::<ApiError>(body) {
            Ok(ApiError {
                error: Some(details),
                ..
            }) => details.message,
            Ok(ApiError {
                message: Some(message),
                ..
            }) => message,
            _ => body.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_message_serialization() {
        let value = serde_json::to_value(ApiMessage::tool("call-1", "getWeather", "{}")).unwrap();
        assert_eq!(
            value,
            json!({"role": "tool", "content": "{}", "tool_call_id": "call-1", "name": "getWeather"})
        );

        let value = serde_json::to_value(ApiMessage::user("hi")).unwrap();
        assert!(value.get("tool_calls").is_none());
    }

    #[test]
    fn test_chunk_parsing() {
        let chunk: StreamChunk = serde_json::from_value(json!({
            "id": "x",
            "choices": [{
                "index": 0,
                "delta": {"role": "assistant", "tool_calls": [{
                    "id": "abc",
                    "function": {"name": "getWeather", "arguments": "{\"location\":"}
                }]},
                "finish_reason": null
            }]
        }))
        .unwrap();
        let call = &chunk.choices[0].delta.tool_calls[0];
        assert_eq!(call.index, None);
        assert_eq!(call.id.as_deref(), Some("abc"));
        assert_eq!(chunk.choices[0].delta.text(), None);
    }

    #[test]
    fn test_delta_text_from_chunks() {
        let delta: Delta = serde_json::from_value(json!({
            "content": [{"type": "thinking", "thinking": []}, {"type": "text", "text": "Hi"}]
        }))
        .unwrap();
        assert_eq!(delta.text().as_deref(), Some("Hi"));

        let delta: Delta = serde_json::from_value(json!({"content": "there"})).unwrap();
        assert_eq!(delta.text().as_deref(), Some("there"));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            ApiError::message_from(r#"{"error": {"message": "bad key"}}"#),
            "bad key"
        );
        assert_eq!(
            ApiError::message_from(r#"{"message": "Unauthorized"}"#),
            "Unauthorized"
        );
        assert_eq!(ApiError::message_from("plain"), "plain");
    }
}
