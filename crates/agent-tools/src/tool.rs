//! Tool trait definition and types.

use std::sync::Arc;

use async_trait::async_trait;
use brain_core::ToolSpec;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::credentials::{CredentialStore, NoCredentials};
use crate::error::ToolError;

/// Who is calling a tool, and where their OAuth grants live.
#[derive(Clone)]
pub struct ToolContext {
    /// Id of the user whose turn triggered the call.
    pub user_id: String,
    /// Lookup for provider access tokens.
    pub credentials: Arc<dyn CredentialStore>,
}

impl ToolContext {
    pub fn new(user_id: impl Into<String>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            user_id: user_id.into(),
            credentials,
        }
    }

    /// A context with no connected accounts.
    pub fn anonymous(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Arc::new(NoCredentials))
    }
}

/// Arguments passed to a tool for execution.
///
/// By the time a tool sees these, the registry has validated them against
/// the tool's input schema and filled in schema defaults.
#[derive(Clone)]
pub struct ToolArgs {
    /// Parameters as key-value pairs.
    pub params: Map<String, Value>,
    /// Calling user and credentials.
    pub context: ToolContext,
}

impl ToolArgs {
    pub fn new(params: Map<String, Value>, context: ToolContext) -> Self {
        Self { params, context }
    }

    /// Get a string parameter, returning an error if missing or not a string.
    pub fn get_string(&self, key: &str) -> Result<String, ToolError> {
        self.params
            .get(key)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))?
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ToolError::InvalidParameter {
                name: key.to_string(),
                reason: "expected string".to_string(),
            })
    }

    /// Get an optional string parameter.
    pub fn get_string_opt(&self, key: &str) -> Option<String> {
        self.params.get(key)?.as_str().map(|s| s.to_string())
    }

    /// Get an unsigned integer parameter with a default value.
    pub fn get_u64_or(&self, key: &str, default: u64) -> u64 {
        self.params
            .get(key)
            .and_then(|v| v.as_u64())
            .unwrap_or(default)
    }
}

/// How a tool call ended from the user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    /// The user has to connect an account before the tool can run.
    SetupRequired,
}

/// Output from a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The result content.
    pub content: Value,
    pub status: ToolStatus,
}

impl ToolOutput {
    /// Create a successful output.
    pub fn success(content: Value) -> Self {
        Self {
            content,
            status: ToolStatus::Success,
        }
    }

    /// Create a "connect your account first" output.
    pub fn setup_required(message: impl Into<String>) -> Self {
        Self {
            content: Value::String(message.into()),
            status: ToolStatus::SetupRequired,
        }
    }

    pub fn is_setup_required(&self) -> bool {
        self.status == ToolStatus::SetupRequired
    }

    /// The value handed back to the model and stored in the tool-result part.
    pub fn to_model_value(&self) -> Value {
        match self.status {
            ToolStatus::Success => self.content.clone(),
            ToolStatus::SetupRequired => json!({
                "message": self.content.as_str().unwrap_or_default(),
                "setupRequired": true,
            }),
        }
    }
}

/// Trait for tools the model can call.
///
/// Tools take schema-validated arguments plus the caller's context and
/// return a JSON result. Failures that the user can fix by connecting an
/// account are reported as [`ToolOutput::setup_required`], not as errors.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's unique name (used for dispatch).
    fn name(&self) -> &str;

    /// Human-readable description of what the tool does.
    fn description(&self) -> &str;

    /// JSON Schema of the tool input.
    fn input_schema(&self) -> Value;

    /// The function-calling contract sent to the model.
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError>;
}
