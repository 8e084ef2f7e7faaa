//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use orchestrator::{DEFAULT_STREAM_TTL, DEFAULT_TURN_TIMEOUT};

/// API server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Bearer tokens, `token:user_id` pairs separated by commas.
    pub api_tokens: String,
    /// Whether turns publish to replayable buffers.
    pub resumable_streams: bool,
    pub turn_timeout: Duration,
    /// How long a completed stream stays resumable.
    pub stream_ttl: Duration,
    /// Overrides the built-in system prompt.
    pub system_prompt: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `PARLEY_API_ADDR` | Server bind address | `127.0.0.1:8787` |
    /// | `DATABASE_URL` | SQLite database URL | `sqlite:parley.db?mode=rwc` |
    /// | `PARLEY_API_TOKENS` | `token:user_id,...` | (empty) |
    /// | `PARLEY_RESUMABLE_STREAMS` | Enable stream resume | `true` |
    /// | `PARLEY_TURN_TIMEOUT_SECS` | Turn wall-clock ceiling | `60` |
    /// | `PARLEY_STREAM_TTL_SECS` | Resume window after completion | `600` |
    /// | `PARLEY_SYSTEM_PROMPT` | System prompt override | (built-in) |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("PARLEY_API_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8787".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:parley.db?mode=rwc".to_string());

        let api_tokens = env::var("PARLEY_API_TOKENS").unwrap_or_default();

        let resumable_streams = match env::var("PARLEY_RESUMABLE_STREAMS") {
            Ok(value) => parse_bool(&value)
                .ok_or(ConfigError::InvalidValue("PARLEY_RESUMABLE_STREAMS"))?,
            Err(_) => true,
        };

        let turn_timeout = secs_var("PARLEY_TURN_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TURN_TIMEOUT);
        let stream_ttl = secs_var("PARLEY_STREAM_TTL_SECS")?.unwrap_or(DEFAULT_STREAM_TTL);

        let system_prompt = env::var("PARLEY_SYSTEM_PROMPT")
            .ok()
            .filter(|prompt| !prompt.trim().is_empty());

        Ok(Self {
            addr,
            database_url,
            api_tokens,
            resumable_streams,
            turn_timeout,
            stream_ttl,
            system_prompt,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn secs_var(key: &'static str) -> Result<Option<Duration>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(|secs| Some(Duration::from_secs(secs)))
            .ok_or(ConfigError::InvalidValue(key)),
        Err(_) => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PARLEY_API_ADDR format")]
    InvalidAddr,

    #[error("Invalid value for {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
