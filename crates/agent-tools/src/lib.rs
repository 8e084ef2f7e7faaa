//! Tool registry and implementations for the Parley chat server.
//!
//! This crate provides a [`ToolRegistry`] of tools the model can call during
//! a turn, the category mapping clients use to enable them, and the
//! credential lookup that OAuth-gated tools rely on.
//!
//! # Built-in Tools
//!
//! - [`Weather`] (`getWeather`) - Current weather via Open-Meteo (no API key needed).
//! - [`WebSearch`] (`webSearch`) - Web search via Tavily. Needs an API key.
//! - [`ListEmails`], [`GetEmail`], [`SendEmail`] - Gmail access with the
//!   user's Google token.
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_tools::{default_registry, resolve_tools, ToolContext, ToolsConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = default_registry(&ToolsConfig::default());
//!     let tools = resolve_tools(&registry, &["weather"]);
//!
//!     let result = tools
//!         .execute("getWeather", &json!({"location": "Paris"}), ToolContext::anonymous("user-1"))
//!         .await
//!         .unwrap();
//!     println!("{}", result.content);
//! }
//! ```

mod categories;
mod credentials;
mod error;
mod registry;
pub mod schema;
mod tool;
pub mod tools;

pub use categories::{resolve_tools, ToolCategory};
pub use credentials::{AccessToken, CredentialStore, NoCredentials, StaticCredentials, GOOGLE_PROVIDER};
pub use error::ToolError;
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolArgs, ToolContext, ToolOutput, ToolStatus};
pub use tools::{GetEmail, GmailClient, ListEmails, SendEmail, Weather, WebSearch};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

use std::sync::Arc;

/// Feature flags for the built-in tools.
#[derive(Debug, Clone, Default)]
pub struct ToolsConfig {
    /// Tavily API key. `webSearch` is only registered when set.
    pub tavily_api_key: Option<String>,
    /// Whether Google OAuth is configured. Gmail tools are only registered when set.
    pub gmail_enabled: bool,
}

impl ToolsConfig {
    /// Read `TAVILY_API_KEY` and `GOOGLE_CLIENT_ID`/`GOOGLE_CLIENT_SECRET`.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            tavily_api_key: non_empty("TAVILY_API_KEY"),
            gmail_enabled: non_empty("GOOGLE_CLIENT_ID").is_some()
                && non_empty("GOOGLE_CLIENT_SECRET").is_some(),
        }
    }
}

/// Create a registry with every built-in tool the configuration enables.
pub fn default_registry(config: &ToolsConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Weather::new());

    if let Some(api_key) = &config.tavily_api_key {
        registry.register(WebSearch::new(api_key.clone()));
    }

    if config.gmail_enabled {
        let gmail = Arc::new(GmailClient::new());
        registry.register(ListEmails::new(gmail.clone()));
        registry.register(SendEmail::new(gmail.clone()));
        registry.register(GetEmail::new(gmail));
    }

    registry
}
