//! Notification type catalog.
//!
//! The [`Catalog`] is loaded once at process start, either from a JSON file
//! or from the definitions stored in the `notification_catalog` table, and is
//! read-only afterwards. Loading validates every entry; any problem is a
//! fatal [`CatalogError`].

pub mod definition;

use std::collections::HashMap;
use std::path::Path;

use validator::Validate;

pub use definition::{
    AudienceStrategy, CooldownSpec, DedupeScope, DedupeSpec, DeepLinkSpec, GroupingSpec,
    NotificationType, PreferenceSpec, QuietHours, RolloutSpec, TriggerSpec, TypeStatus,
};

use crate::error::CatalogError;

/// Immutable registry of notification types keyed by `notification_key`.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    types: HashMap<String, NotificationType>,
}

impl Catalog {
    /// Build a catalog from already-deserialized entries.
    pub fn from_types(types: Vec<NotificationType>) -> Result<Self, CatalogError> {
        let mut map = HashMap::with_capacity(types.len());
        for entry in types {
            entry.validate().map_err(|e| CatalogError::Invalid {
                key: entry.notification_key.clone(),
                reason: e.to_string(),
            })?;

            let key = entry.notification_key.clone();
            if map.insert(key.clone(), entry).is_some() {
                return Err(CatalogError::DuplicateKey(key));
            }
        }
        check_event_id_namespaces(&map)?;
        Ok(Self { types: map })
    }

    /// Parse a JSON array of catalog entries.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let types: Vec<NotificationType> = serde_json::from_str(json)?;
        Self::from_types(types)
    }

    /// Parse one JSON definition per entry (the `notification_catalog` table
    /// stores each entry as a JSONB document).
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = serde_json::Value>,
    ) -> Result<Self, CatalogError> {
        let types = definitions
            .into_iter()
            .map(serde_json::from_value::<NotificationType>)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_types(types)
    }

    /// Read and parse a catalog file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Look up a type by key. Unknown keys are an error, never a no-op.
    pub fn lookup(&self, key: &str) -> Result<&NotificationType, CatalogError> {
        self.types
            .get(key)
            .ok_or_else(|| CatalogError::UnknownNotificationType(key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = &NotificationType> {
        let mut entries: Vec<_> = self.types.values().collect();
        entries.sort_by(|a, b| a.notification_key.cmp(&b.notification_key));
        entries.into_iter()
    }

    /// Every `(preference_key, default)` pair declared by the catalog.
    pub fn preference_defaults(&self) -> Vec<(String, bool)> {
        let mut defaults: Vec<(String, bool)> = self
            .iter()
            .map(|t| (t.preferences.preference_key.clone(), t.preferences.default))
            .collect();
        defaults.sort_by(|a, b| a.0.cmp(&b.0));
        defaults.dedup_by(|a, b| a.0 == b.0);
        defaults
    }
}

/// Dedup locks are keyed by the rendered event id alone, so two types whose
/// event ids could render to the same string would share dedup slots. Every
/// `event_id_format` must open with a literal namespace that is not a prefix
/// of any other type's.
fn check_event_id_namespaces(
    types: &HashMap<String, NotificationType>,
) -> Result<(), CatalogError> {
    let mut entries: Vec<(&str, &str)> = types
        .values()
        .map(|t| (t.notification_key.as_str(), t.trigger.event_id_format.literal_prefix()))
        .collect();
    entries.sort();

    for (i, &(key, prefix)) in entries.iter().enumerate() {
        if prefix.is_empty() {
            return Err(CatalogError::Invalid {
                key: key.to_string(),
                reason: "trigger.event_id_format must start with a literal namespace".to_string(),
            });
        }
        for &(other_key, other_prefix) in &entries[i + 1..] {
            if prefix.starts_with(other_prefix) || other_prefix.starts_with(prefix) {
                return Err(CatalogError::Invalid {
                    key: key.to_string(),
                    reason: format!(
                        "event id namespace {prefix:?} overlaps {other_prefix:?} of {other_key}"
                    ),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;

    use super::*;

    const CHAT: &str = r#"{
        "notification_key": "chat-message",
        "owner": "social",
        "status": "active",
        "channels": ["push"],
        "audience": "league-members-except-sender",
        "source": "chat",
        "trigger": { "name": "chat.message.created", "event_id_format": "chat:{message_id}" },
        "dedupe": { "scope": "per_user_per_event", "ttl_seconds": 60 },
        "cooldown": { "per_user_seconds": 30 },
        "quiet_hours": { "start": "23:00", "end": "07:00" },
        "preferences": { "preference_key": "chat", "default": true },
        "grouping": { "thread_id_format": "league:{league_id}" },
        "rollout": { "enabled": true, "percentage": 100 }
    }"#;

    fn catalog_json(entries: &[&str]) -> String {
        format!("[{}]", entries.join(","))
    }

    #[test]
    fn loads_and_looks_up_entry() {
        let catalog = Catalog::from_json_str(&catalog_json(&[CHAT])).unwrap();
        let chat = catalog.lookup("chat-message").unwrap();
        assert_eq!(chat.scope(), DedupeScope::PerUserPerEvent);
        assert_eq!(chat.cooldown(), Some(chrono::Duration::seconds(30)));
        assert_eq!(chat.preference_key(), "chat");
        assert!(chat.grouping.collapse_id_format.is_none());
    }

    #[test]
    fn unknown_key_is_an_error() {
        let catalog = Catalog::from_json_str(&catalog_json(&[CHAT])).unwrap();
        assert_matches!(
            catalog.lookup("goal-scored"),
            Err(CatalogError::UnknownNotificationType(k)) if k == "goal-scored"
        );
    }

    #[test]
    fn duplicate_key_is_rejected() {
        assert_matches!(
            Catalog::from_json_str(&catalog_json(&[CHAT, CHAT])),
            Err(CatalogError::DuplicateKey(k)) if k == "chat-message"
        );
    }

    #[test]
    fn rollout_above_hundred_is_rejected() {
        let bad = CHAT.replace(r#""percentage": 100"#, r#""percentage": 101"#);
        assert_matches!(
            Catalog::from_json_str(&catalog_json(&[&bad])),
            Err(CatalogError::Invalid { .. })
        );
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let bad = CHAT.replace(r#""ttl_seconds": 60"#, r#""ttl_seconds": 0"#);
        assert_matches!(
            Catalog::from_json_str(&catalog_json(&[&bad])),
            Err(CatalogError::Invalid { .. })
        );
    }

    #[test]
    fn malformed_template_fails_parse() {
        let bad = CHAT.replace("chat:{message_id}", "chat:{message_id");
        assert_matches!(
            Catalog::from_json_str(&catalog_json(&[&bad])),
            Err(CatalogError::Parse(_))
        );
    }

    #[test]
    fn missing_preferences_section_is_rejected() {
        let bad = CHAT.replace(r#""preferences": { "preference_key": "chat", "default": true },"#, "");
        assert_matches!(
            Catalog::from_json_str(&catalog_json(&[&bad])),
            Err(CatalogError::Parse(_))
        );
    }

    #[test]
    fn overlapping_event_id_namespaces_are_rejected() {
        let reply = CHAT
            .replace("chat-message", "chat-reply")
            .replace("chat:{message_id}", "chat:reply:{message_id}");
        assert_matches!(
            Catalog::from_json_str(&catalog_json(&[CHAT, &reply])),
            Err(CatalogError::Invalid { key, .. }) if key == "chat-message"
        );

        let distinct = CHAT
            .replace("chat-message", "chat-reaction")
            .replace("chat:{message_id}", "reaction:{message_id}");
        assert!(Catalog::from_json_str(&catalog_json(&[CHAT, &distinct])).is_ok());
    }

    #[test]
    fn event_id_without_literal_namespace_is_rejected() {
        let bad = CHAT.replace("chat:{message_id}", "{message_id}");
        assert_matches!(
            Catalog::from_json_str(&catalog_json(&[&bad])),
            Err(CatalogError::Invalid { .. })
        );
    }

    #[test]
    fn omitted_rollout_selects_everyone() {
        let mut value: serde_json::Value = serde_json::from_str(CHAT).unwrap();
        value.as_object_mut().unwrap().remove("rollout");
        let catalog = Catalog::from_definitions(vec![value]).unwrap();
        let chat = catalog.lookup("chat-message").unwrap();
        assert!(!chat.rollout.enabled);
        assert_eq!(chat.rollout.percentage, 100);
    }

    #[test]
    fn loads_from_definitions_and_file() {
        let value: serde_json::Value = serde_json::from_str(CHAT).unwrap();
        let catalog = Catalog::from_definitions(vec![value]).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.preference_defaults(),
            vec![("chat".to_string(), true)]
        );

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(catalog_json(&[CHAT]).as_bytes()).unwrap();
        let from_file = Catalog::load_file(file.path()).unwrap();
        assert!(from_file.lookup("chat-message").is_ok());

        assert_matches!(
            Catalog::load_file("/nonexistent/catalog.json"),
            Err(CatalogError::Io { .. })
        );
    }
}
