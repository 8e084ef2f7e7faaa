//! OAuth credential lookup for tools that act on a user's behalf.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ToolError;

/// Provider id for Google accounts.
pub const GOOGLE_PROVIDER: &str = "google";

/// An OAuth access token and the scopes it was granted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    /// Granted scopes. Empty means the grant did not record scopes.
    pub scopes: Vec<String>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, scopes: Vec<String>) -> Self {
        Self {
            token: token.into(),
            scopes,
        }
    }

    /// Parse a space or comma separated scope string as stored by OAuth providers.
    pub fn parse_scopes(scope: &str) -> Vec<String> {
        scope
            .split(|c: char| c == ' ' || c == ',')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }

    /// Whether any of `accepted` was granted.
    ///
    /// Grants without recorded scopes are trusted.
    pub fn has_any_scope(&self, accepted: &[&str]) -> bool {
        self.scopes.is_empty()
            || self
                .scopes
                .iter()
                .any(|granted| accepted.iter().any(|scope| granted == scope))
    }
}

/// Where tools find the calling user's provider tokens.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Access token for `(user_id, provider)`, or `None` when not connected.
    async fn access_token(
        &self,
        user_id: &str,
        provider: &str,
    ) -> Result<Option<AccessToken>, ToolError>;
}

/// A store with no connected accounts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

#[async_trait]
impl CredentialStore for NoCredentials {
    async fn access_token(
        &self,
        _user_id: &str,
        _provider: &str,
    ) -> Result<Option<AccessToken>, ToolError> {
        Ok(None)
    }
}

/// Fixed in-memory credentials, keyed by `(user_id, provider)`.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    tokens: HashMap<(String, String), AccessToken>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(
        mut self,
        user_id: impl Into<String>,
        provider: impl Into<String>,
        token: AccessToken,
    ) -> Self {
        self.tokens.insert((user_id.into(), provider.into()), token);
        self
    }
}

#[async_trait]
impl CredentialStore for StaticCredentials {
    async fn access_token(
        &self,
        user_id: &str,
        provider: &str,
    ) -> Result<Option<AccessToken>, ToolError> {
        Ok(self
            .tokens
            .get(&(user_id.to_string(), provider.to_string()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scopes() {
        let scopes = AccessToken::parse_scopes("openid email,https://www.googleapis.com/auth/gmail.send");
        assert_eq!(scopes.len(), 3);
        assert_eq!(scopes[2], "https://www.googleapis.com/auth/gmail.send");
    }

    #[test]
    fn test_scope_check() {
        let token = AccessToken::new("t", vec!["a".to_string(), "b".to_string()]);
        assert!(token.has_any_scope(&["x", "b"]));
        assert!(!token.has_any_scope(&["x"]));
        assert!(AccessToken::new("t", Vec::new()).has_any_scope(&["x"]));
    }

    #[tokio::test]
    async fn test_static_credentials() {
        let store = StaticCredentials::new().with_token(
            "user-1",
            GOOGLE_PROVIDER,
            AccessToken::new("secret", Vec::new()),
        );
        let token = store.access_token("user-1", GOOGLE_PROVIDER).await.unwrap();
        assert_eq!(token.map(|t| t.token), Some("secret".to_string()));
        assert!(store.access_token("user-2", GOOGLE_PROVIDER).await.unwrap().is_none());
        assert!(NoCredentials.access_token("user-1", GOOGLE_PROVIDER).await.unwrap().is_none());
    }
}
