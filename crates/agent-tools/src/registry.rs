//! Tool registry for managing and executing tools.

use std::sync::Arc;

use brain_core::ToolSpec;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ToolError;
use crate::schema;
use crate::tool::{Tool, ToolArgs, ToolContext, ToolOutput};

/// Registry for managing tools.
///
/// The registry holds tools in registration order and dispatches execution
/// requests by name. Arguments are validated against the tool's input schema
/// before the tool runs. Iteration order is stable, so the tool list sent to
/// the model is deterministic.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    ///
    /// If a tool with the same name already exists, it will be replaced.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared tool.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        info!(tool = %name, "Registering tool");
        self.tools.insert(name, tool);
    }

    /// Registered tool names, in registration order.
    pub fn list_tools(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Check if a tool is registered.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Function-calling specs of every registered tool.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|tool| tool.spec()).collect()
    }

    /// Validate `arguments` and execute the named tool.
    pub async fn execute(
        &self,
        name: &str,
        arguments: &Value,
        context: ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let params = schema::validate(&tool.input_schema(), arguments)?;
        debug!(tool = %name, params = params.len(), "Executing tool");

        let result = tool.execute(ToolArgs::new(params, context)).await?;

        debug!(
            tool = %name,
            setup_required = result.is_setup_required(),
            "Tool completed"
        );

        Ok(result)
    }
}

impl FromIterator<Arc<dyn Tool>> for ToolRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Tool>>>(iter: I) -> Self {
        let tools = iter
            .into_iter()
            .map(|tool| (tool.name().to_string(), tool))
            .collect();
        Self { tools }
    }
}
