//! User notification preferences.

use matchday_core::types::{Timestamp, UserId};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `user_preferences` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserPreference {
    pub user_id: UserId,
    /// JSON object of `preference_key -> bool`.
    pub preferences: serde_json::Value,
    pub updated_at: Timestamp,
}

impl UserPreference {
    /// Fail-closed lookup: anything other than an explicit `true` is an
    /// opt-out.
    pub fn is_enabled(&self, preference_key: &str) -> bool {
        self.preferences
            .get(preference_key)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pref(value: serde_json::Value) -> UserPreference {
        UserPreference {
            user_id: UserId::nil(),
            preferences: value,
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn explicit_true_is_enabled() {
        assert!(pref(serde_json::json!({"chat": true})).is_enabled("chat"));
    }

    #[test]
    fn missing_false_or_malformed_is_disabled() {
        let p = pref(serde_json::json!({"chat": false, "goals": "yes"}));
        assert!(!p.is_enabled("chat"));
        assert!(!p.is_enabled("goals"));
        assert!(!p.is_enabled("gameweek"));
    }
}
