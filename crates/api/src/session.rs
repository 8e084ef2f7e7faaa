//! Bearer token authentication.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use orchestrator::{ChatError, Session};
use tracing::warn;

/// Resolves a bearer token to a session.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Option<Session>;
}

/// Fixed token table, parsed from `token:user_id,token:user_id`.
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    tokens: HashMap<String, String>,
}

impl StaticTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(entries: &str) -> Self {
        let mut tokens = HashMap::new();
        for entry in entries.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
            match entry.split_once(':') {
                Some((token, user_id)) if !token.trim().is_empty() && !user_id.trim().is_empty() => {
                    tokens.insert(token.trim().to_string(), user_id.trim().to_string());
                }
                _ => warn!("Ignoring malformed API token entry"),
            }
        }
        Self { tokens }
    }

    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), user_id.into());
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl SessionResolver for StaticTokens {
    async fn resolve(&self, token: &str) -> Option<Session> {
        self.tokens.get(token).map(Session::regular)
    }
}

/// Resolve the request's `Authorization: Bearer` header.
pub async fn authenticate(
    resolver: &dyn SessionResolver,
    headers: &HeaderMap,
) -> Result<Session, ChatError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ChatError::Unauthorized)?;

    resolver.resolve(token).await.ok_or(ChatError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_parse_tokens() {
        let tokens = StaticTokens::parse("abc:alice, def:bob,broken,:nobody");
        assert_eq!(tokens.len(), 2);
    }

    #[tokio::test]
    async fn test_authenticate() {
        let tokens = StaticTokens::parse("abc:alice");

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        let session = authenticate(&tokens, &headers).await.unwrap();
        assert_eq!(session.user_id, "alice");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer nope"));
        assert!(matches!(
            authenticate(&tokens, &headers).await,
            Err(ChatError::Unauthorized)
        ));

        assert!(authenticate(&tokens, &HeaderMap::new()).await.is_err());
    }
}
