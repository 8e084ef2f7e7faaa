//! Per-tier turn limits and model access.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model_selection::{DEFAULT_CHAT_MODEL, REASONING_CHAT_MODEL};

/// Length of the rate-limit window.
pub const RATE_LIMIT_WINDOW_HOURS: i64 = 24;

/// Account tier supplied by the session layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    Regular,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Regular => "regular",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "regular" => Some(UserType::Regular),
            _ => None,
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub user_type: UserType,
}

impl Session {
    pub fn new(user_id: impl Into<String>, user_type: UserType) -> Self {
        Self {
            user_id: user_id.into(),
            user_type,
        }
    }

    /// A regular-tier session.
    pub fn regular(user_id: impl Into<String>) -> Self {
        Self::new(user_id, UserType::Regular)
    }

    pub fn entitlements(&self) -> Entitlements {
        Entitlements::for_user_type(self.user_type)
    }
}

/// What a tier may do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entitlements {
    /// Maximum user turns in the trailing window.
    pub max_messages_per_day: i64,
    /// Model ids the tier may select.
    pub available_chat_model_ids: Vec<&'static str>,
}

impl Entitlements {
    pub fn for_user_type(user_type: UserType) -> Self {
        match user_type {
            UserType::Regular => Self {
                max_messages_per_day: 100,
                available_chat_model_ids: vec![DEFAULT_CHAT_MODEL, REASONING_CHAT_MODEL],
            },
        }
    }

    pub fn allows_model(&self, model_id: &str) -> bool {
        self.available_chat_model_ids.iter().any(|id| *id == model_id)
    }

    /// Whether another turn fits, given the turns already sent in the window.
    pub fn allows_turn(&self, turns_in_window: i64) -> bool {
        turns_in_window < self.max_messages_per_day
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_tier() {
        let entitlements = Session::regular("u1").entitlements();
        assert!(entitlements.allows_model("chat-model"));
        assert!(entitlements.allows_model("chat-model-reasoning"));
        assert!(!entitlements.allows_model("title-model"));
    }

    #[test]
    fn test_turn_ceiling_is_inclusive() {
        let entitlements = Entitlements::for_user_type(UserType::Regular);
        assert!(entitlements.allows_turn(0));
        assert!(entitlements.allows_turn(99));
        assert!(!entitlements.allows_turn(100));
        assert!(!entitlements.allows_turn(150));
    }

    #[test]
    fn test_user_type_round_trip() {
        assert_eq!(UserType::parse("regular"), Some(UserType::Regular));
        assert_eq!(UserType::parse("admin"), None);
        assert_eq!(UserType::Regular.to_string(), "regular");
    }
}
