//! Preference seeding from catalog defaults.

use matchday_core::catalog::Catalog;
use matchday_core::types::UserId;
use matchday_db::models::preference::UserPreference;

use crate::store::{PreferenceStore, StoreError};

/// The catalog's `preference_key -> default` pairs as a JSON object.
pub fn catalog_defaults(catalog: &Catalog) -> serde_json::Value {
    serde_json::Value::Object(
        catalog
            .preference_defaults()
            .into_iter()
            .map(|(key, enabled)| (key, serde_json::Value::Bool(enabled)))
            .collect(),
    )
}

/// Write catalog defaults for a new user without touching existing choices.
///
/// This is the only place `preferences.default` is read. Dispatch treats a
/// missing key as disabled, so a user who was never seeded receives nothing
/// preference-gated.
pub async fn seed_user_defaults(
    catalog: &Catalog,
    store: &dyn PreferenceStore,
    user_id: UserId,
) -> Result<UserPreference, StoreError> {
    let defaults = catalog_defaults(catalog);
    let seeded = store.seed_defaults(user_id, &defaults).await?;
    tracing::debug!(%user_id, "Seeded notification preference defaults");
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::memory::MemoryStore;

    const CATALOG: &str = r#"[
        {
            "notification_key": "chat-message",
            "owner": "social", "status": "active", "source": "chat",
            "audience": "league-members-except-sender",
            "trigger": { "name": "chat.message.created", "event_id_format": "chat:{message_id}" },
            "dedupe": { "scope": "per_user_per_event", "ttl_seconds": 60 },
            "preferences": { "preference_key": "chat", "default": true }
        },
        {
            "notification_key": "marketing",
            "owner": "growth", "status": "active", "source": "admin",
            "audience": "preference-broadcast",
            "trigger": { "name": "admin.broadcast", "event_id_format": "mkt:{campaign_id}" },
            "dedupe": { "scope": "global", "ttl_seconds": 86400 },
            "preferences": { "preference_key": "marketing", "default": false }
        }
    ]"#;

    #[tokio::test]
    async fn seeds_defaults_once() {
        let catalog = Catalog::from_json_str(CATALOG).unwrap();
        let store = MemoryStore::new();
        let user = Uuid::new_v4();

        assert_eq!(
            catalog_defaults(&catalog),
            serde_json::json!({"chat": true, "marketing": false})
        );

        let seeded = seed_user_defaults(&catalog, &store, user).await.unwrap();
        assert!(seeded.is_enabled("chat"));
        assert!(!seeded.is_enabled("marketing"));

        store.set_preference(user, "chat", false);
        let reseeded = seed_user_defaults(&catalog, &store, user).await.unwrap();
        assert!(!reseeded.is_enabled("chat"));
    }
}
