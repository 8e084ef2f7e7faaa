//! Tool calling types exchanged between brains and the step loop.
//!
//! A brain receives [`ToolSpec`]s describing what it may call and answers
//! with [`ToolCall`]s. Execution itself lives outside this crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Function-calling contract surfaced to the model for one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// JSON Schema of the tool input.
    pub input_schema: Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique id of this call within the turn.
    pub id: String,
    /// Name of the tool to execute.
    pub name: String,
    /// Arguments as produced by the model (usually a JSON object).
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Build a call from the raw JSON argument string a provider streams back.
    ///
    /// Empty argument strings are treated as `{}`.
    pub fn from_json(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments_json: &str,
    ) -> Result<Self, serde_json::Error> {
        let arguments = if arguments_json.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(arguments_json)?
        };
        Ok(Self::new(id, name, arguments))
    }

    /// Get a string argument by name.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }
}
