//! Configuration for MistralBrain.

use brain_core::BrainError;
use std::env;

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://api.mistral.ai";

/// Default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "mistral-large-latest";

/// Default model for chat titles.
pub const DEFAULT_TITLE_MODEL: &str = "mistral-small-latest";

/// Configuration for MistralBrain.
#[derive(Debug, Clone)]
pub struct MistralBrainConfig {
    /// API base URL (the `/v1/chat/completions` path is appended).
    pub api_url: String,

    /// API key for authentication.
    pub api_key: String,

    /// Model used for chat turns.
    pub chat_model: String,

    /// Model used for title generation.
    pub title_model: String,

    /// Maximum tokens for response.
    pub max_tokens: Option<u32>,

    /// Temperature for generation (0.0 - 1.5).
    pub temperature: Option<f32>,
}

impl Default for MistralBrainConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            title_model: DEFAULT_TITLE_MODEL.to_string(),
            max_tokens: None,
            temperature: Some(0.7),
        }
    }
}

impl MistralBrainConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `MISTRAL_API_KEY` - API key for authentication
    ///
    /// Optional environment variables:
    /// - `MISTRAL_API_URL` - API URL (default: https://api.mistral.ai)
    /// - `MISTRAL_CHAT_MODEL` - Chat model (default: mistral-large-latest)
    /// - `MISTRAL_TITLE_MODEL` - Title model (default: mistral-small-latest)
    /// - `MISTRAL_MAX_TOKENS` - Max tokens (default: provider default)
    /// - `MISTRAL_TEMPERATURE` - Temperature (default: 0.7)
    pub fn from_env() -> Result<Self, BrainError> {
        let api_key = env::var("MISTRAL_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| BrainError::Configuration("MISTRAL_API_KEY not set".to_string()))?;

        let api_url = env::var("MISTRAL_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let chat_model =
            env::var("MISTRAL_CHAT_MODEL").unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string());

        let title_model =
            env::var("MISTRAL_TITLE_MODEL").unwrap_or_else(|_| DEFAULT_TITLE_MODEL.to_string());

        let max_tokens = env::var("MISTRAL_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok());

        let temperature = env::var("MISTRAL_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(Some(0.7));

        Ok(Self {
            api_url,
            api_key,
            chat_model,
            title_model,
            max_tokens,
            temperature,
        })
    }

    /// Create a new config builder.
    pub fn builder() -> MistralBrainConfigBuilder {
        MistralBrainConfigBuilder::default()
    }

    /// Full URL of the chat completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.api_url.trim_end_matches('/'))
    }
}

/// Builder for MistralBrainConfig.
#[derive(Debug, Default)]
pub struct MistralBrainConfigBuilder {
    config: MistralBrainConfig,
}

impl MistralBrainConfigBuilder {
    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// Set the API URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set the chat model name.
    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.config.chat_model = model.into();
        self
    }

    /// Set the title model name.
    pub fn title_model(mut self, model: impl Into<String>) -> Self {
        self.config.title_model = model.into();
        self
    }

    /// Set the max tokens.
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = Some(tokens);
        self
    }

    /// Set the temperature.
    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.temperature = Some(temp);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> MistralBrainConfig {
        self.config
    }
}
