//! Tool categories and the capability resolver.
//!
//! Clients enable tools by category. A category expands to a fixed list of
//! tool names; the resolver looks those names up in a registry.

use std::sync::Arc;

use tracing::debug;

use crate::registry::ToolRegistry;
use crate::tool::Tool;

/// A user-facing group of tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolCategory {
    Weather,
    Gmail,
    WebSearch,
}

impl ToolCategory {
    pub const ALL: [ToolCategory; 3] = [
        ToolCategory::Weather,
        ToolCategory::Gmail,
        ToolCategory::WebSearch,
    ];

    /// Parse a category name as sent by clients.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "weather" => Some(ToolCategory::Weather),
            "gmail" => Some(ToolCategory::Gmail),
            "webSearch" | "search" => Some(ToolCategory::WebSearch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::Weather => "weather",
            ToolCategory::Gmail => "gmail",
            ToolCategory::WebSearch => "webSearch",
        }
    }

    /// Tool names in this category.
    pub fn tool_names(&self) -> &'static [&'static str] {
        match self {
            ToolCategory::Weather => &["getWeather"],
            ToolCategory::Gmail => &["listEmails", "sendEmail", "getEmail"],
            ToolCategory::WebSearch => &["webSearch"],
        }
    }
}

/// Resolve requested category names into the tools the model may call.
///
/// The result is the flat union of each known category's tools, in request
/// order. Unknown category names are ignored and tools the registry does not
/// have (for example when a feature flag is off) are skipped.
pub fn resolve_tools<S: AsRef<str>>(registry: &ToolRegistry, categories: &[S]) -> ToolRegistry {
    let mut selected: Vec<Arc<dyn Tool>> = Vec::new();

    for name in categories {
        let Some(category) = ToolCategory::parse(name.as_ref()) else {
            debug!(category = name.as_ref(), "Ignoring unknown tool category");
            continue;
        };

        for tool_name in category.tool_names() {
            match registry.get(tool_name) {
                Some(tool) if !selected.iter().any(|t| t.name() == *tool_name) => {
                    selected.push(tool.clone());
                }
                Some(_) => {}
                None => debug!(tool = *tool_name, "Tool not registered, skipping"),
            }
        }
    }

    selected.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::tool::{ToolArgs, ToolOutput};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Named(&'static str);

    #[async_trait]
    impl Tool for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "test tool"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, _args: ToolArgs) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::success(Value::Null))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for name in ["getWeather", "listEmails", "sendEmail", "getEmail"] {
            registry.register(Named(name));
        }
        registry
    }

    #[test]
    fn test_resolve_union() {
        let tools = resolve_tools(&registry(), &["weather", "gmail"]);
        assert_eq!(
            tools.list_tools(),
            vec!["getWeather", "listEmails", "sendEmail", "getEmail"]
        );
    }

    #[test]
    fn test_unknown_category_ignored() {
        let tools = resolve_tools(&registry(), &["weather", "astrology"]);
        assert_eq!(tools.list_tools(), vec!["getWeather"]);
    }

    #[test]
    fn test_unregistered_tool_skipped() {
        let tools = resolve_tools(&registry(), &["webSearch", "search"]);
        assert!(tools.is_empty());
    }

    #[test]
    fn test_duplicates_collapse() {
        let tools = resolve_tools(&registry(), &["weather", "weather"]);
        assert_eq!(tools.len(), 1);
    }

    #[test]
    fn test_category_names() {
        assert_eq!(ToolCategory::parse("search"), Some(ToolCategory::WebSearch));
        for category in ToolCategory::ALL {
            assert_eq!(ToolCategory::parse(category.as_str()), Some(category));
        }
    }
}
