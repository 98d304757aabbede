//! Repository for the `user_preferences` table.

use matchday_core::types::UserId;
use sqlx::PgPool;

use crate::models::preference::UserPreference;

/// Column list for `user_preferences` queries.
const COLUMNS: &str = "user_id, preferences, updated_at";

/// Per-user opt-in flags keyed by preference key.
pub struct UserPreferenceRepo;

impl UserPreferenceRepo {
    /// Get a user's preference row, if one exists.
    pub async fn get(pool: &PgPool, user_id: UserId) -> Result<Option<UserPreference>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_preferences WHERE user_id = $1");
        sqlx::query_as::<_, UserPreference>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Set one preference key, creating the row if needed.
    pub async fn set(
        pool: &PgPool,
        user_id: UserId,
        preference_key: &str,
        enabled: bool,
    ) -> Result<UserPreference, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_preferences (user_id, preferences) \
             VALUES ($1, jsonb_build_object($2::text, $3::boolean)) \
             ON CONFLICT (user_id) DO UPDATE SET \
                preferences = user_preferences.preferences \
                    || jsonb_build_object($2::text, $3::boolean), \
                updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserPreference>(&query)
            .bind(user_id)
            .bind(preference_key)
            .bind(enabled)
            .fetch_one(pool)
            .await
    }

    /// Seed catalog defaults for a user without overwriting existing choices.
    ///
    /// `defaults` is a JSON object of `preference_key -> bool`; keys the user
    /// already has keep their stored value.
    pub async fn seed_defaults(
        pool: &PgPool,
        user_id: UserId,
        defaults: &serde_json::Value,
    ) -> Result<UserPreference, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_preferences (user_id, preferences) \
             VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET \
                preferences = $2 || user_preferences.preferences, \
                updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserPreference>(&query)
            .bind(user_id)
            .bind(defaults)
            .fetch_one(pool)
            .await
    }

    /// Users whose preference for `preference_key` is explicitly `true`.
    pub async fn list_users_with_enabled(
        pool: &PgPool,
        preference_key: &str,
    ) -> Result<Vec<UserId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT user_id FROM user_preferences \
             WHERE preferences @> jsonb_build_object($1::text, true) \
             ORDER BY user_id",
        )
        .bind(preference_key)
        .fetch_all(pool)
        .await
    }
}
