//! Per-candidate suppression pipeline.
//!
//! Runs after rollout, staleness and (for global scope) the event-level lock,
//! which the dispatcher evaluates once per event. Order per candidate:
//!
//! 1. per-user dedup lock (per-user scope only)
//! 2. preference (fail-closed)
//! 3. device eligibility
//! 4. cooldown
//! 5. quiet hours
//!
//! The first failing check decides the result. Because the per-user slot is
//! claimed first, a later suppression still consumes it.

use std::sync::Arc;

use chrono::FixedOffset;

use matchday_core::catalog::{DedupeScope, NotificationType};
use matchday_core::send_result::SendResult;
use matchday_core::suppression::{cooldown_window_start, in_quiet_hours};
use matchday_core::types::{Timestamp, UserId};
use matchday_db::models::dispatch_lock::NewDispatchLock;

use crate::store::{Acquisition, DeviceRegistry, DispatchLedger, PreferenceStore, StoreError};

/// What to do with one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Send to these provider device ids.
    Deliver { device_ids: Vec<String> },
    Suppress(SendResult),
}

pub struct SuppressionFilter {
    ledger: Arc<dyn DispatchLedger>,
    preferences: Arc<dyn PreferenceStore>,
    devices: Arc<dyn DeviceRegistry>,
    quiet_hours_offset: FixedOffset,
}

impl SuppressionFilter {
    pub fn new(
        ledger: Arc<dyn DispatchLedger>,
        preferences: Arc<dyn PreferenceStore>,
        devices: Arc<dyn DeviceRegistry>,
        quiet_hours_offset: FixedOffset,
    ) -> Self {
        Self {
            ledger,
            preferences,
            devices,
            quiet_hours_offset,
        }
    }

    pub async fn evaluate(
        &self,
        ntype: &NotificationType,
        event_id: &str,
        user_id: UserId,
        now: Timestamp,
    ) -> Result<Verdict, StoreError> {
        if ntype.scope() == DedupeScope::PerUserPerEvent {
            let lock = NewDispatchLock {
                scope: DedupeScope::PerUserPerEvent,
                notification_key: ntype.notification_key.clone(),
                event_id: event_id.to_string(),
                user_id: Some(user_id),
                created_at: now,
            };
            if self.ledger.try_acquire(&lock).await? == Acquisition::AlreadyExists {
                return Ok(Verdict::Suppress(SendResult::SuppressedDuplicate));
            }
        }

        let enabled = self
            .preferences
            .get(user_id)
            .await?
            .is_some_and(|p| p.is_enabled(ntype.preference_key()));
        if !enabled {
            return Ok(Verdict::Suppress(SendResult::SuppressedPreference));
        }

        let device_ids: Vec<String> = self
            .devices
            .devices_for_user(user_id)
            .await?
            .into_iter()
            .filter(|d| d.status().is_deliverable())
            .map(|d| d.provider_device_id)
            .collect();
        if device_ids.is_empty() {
            return Ok(Verdict::Suppress(SendResult::SuppressedUnsubscribed));
        }

        if let Some(cooldown) = ntype.cooldown() {
            let since = cooldown_window_start(now, cooldown);
            if self
                .ledger
                .has_accepted_since(user_id, &ntype.notification_key, since)
                .await?
            {
                return Ok(Verdict::Suppress(SendResult::SuppressedCooldown));
            }
        }

        if let Some(quiet) = &ntype.quiet_hours {
            if in_quiet_hours(quiet, now, self.quiet_hours_offset) {
                return Ok(Verdict::Suppress(SendResult::SuppressedQuietHours));
            }
        }

        Ok(Verdict::Deliver { device_ids })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use matchday_core::catalog::Catalog;
    use matchday_core::device::SubscriptionState;

    use super::*;
    use crate::memory::MemoryStore;

    const CHAT: &str = r#"[{
        "notification_key": "chat-message",
        "owner": "social", "status": "active", "source": "chat",
        "audience": "league-members-except-sender",
        "trigger": { "name": "chat.message.created", "event_id_format": "chat:{message_id}" },
        "dedupe": { "scope": "per_user_per_event", "ttl_seconds": 60 },
        "cooldown": { "per_user_seconds": 30 },
        "quiet_hours": { "start": "23:00", "end": "07:00" },
        "preferences": { "preference_key": "chat", "default": true }
    }]"#;

    fn filter(store: &Arc<MemoryStore>) -> SuppressionFilter {
        SuppressionFilter::new(
            store.clone(),
            store.clone(),
            store.clone(),
            FixedOffset::east_opt(0).unwrap(),
        )
    }

    fn afternoon() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 14, 14, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn opted_in_user_with_device_is_delivered() {
        let store = Arc::new(MemoryStore::new());
        let catalog = Catalog::from_json_str(CHAT).unwrap();
        let user = Uuid::from_u128(1);
        store.set_preference(user, "chat", true);
        store.add_device(user, "dev-1", SubscriptionState::Subscribed);

        let verdict = filter(&store)
            .evaluate(catalog.lookup("chat-message").unwrap(), "chat:1", user, afternoon())
            .await
            .unwrap();
        assert_eq!(
            verdict,
            Verdict::Deliver {
                device_ids: vec!["dev-1".into()]
            }
        );
    }

    #[tokio::test]
    async fn second_evaluation_is_duplicate() {
        let store = Arc::new(MemoryStore::new());
        let catalog = Catalog::from_json_str(CHAT).unwrap();
        let chat = catalog.lookup("chat-message").unwrap();
        let user = Uuid::from_u128(1);
        let f = filter(&store);

        // Preference suppression still claims the slot.
        let first = f.evaluate(chat, "chat:1", user, afternoon()).await.unwrap();
        assert_eq!(first, Verdict::Suppress(SendResult::SuppressedPreference));
        let second = f.evaluate(chat, "chat:1", user, afternoon()).await.unwrap();
        assert_eq!(second, Verdict::Suppress(SendResult::SuppressedDuplicate));
    }

    #[tokio::test]
    async fn unsubscribed_device_only_is_suppressed() {
        let store = Arc::new(MemoryStore::new());
        let catalog = Catalog::from_json_str(CHAT).unwrap();
        let user = Uuid::from_u128(1);
        store.set_preference(user, "chat", true);
        store.add_device(user, "dev-1", SubscriptionState::Unsubscribed);

        let verdict = filter(&store)
            .evaluate(catalog.lookup("chat-message").unwrap(), "chat:1", user, afternoon())
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Suppress(SendResult::SuppressedUnsubscribed));
    }

    #[tokio::test]
    async fn quiet_hours_apply_last() {
        let store = Arc::new(MemoryStore::new());
        let catalog = Catalog::from_json_str(CHAT).unwrap();
        let user = Uuid::from_u128(1);
        store.set_preference(user, "chat", true);
        store.add_device(user, "dev-1", SubscriptionState::Pending);

        let night = Utc.with_ymd_and_hms(2026, 3, 14, 23, 30, 0).unwrap();
        let verdict = filter(&store)
            .evaluate(catalog.lookup("chat-message").unwrap(), "chat:1", user, night)
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Suppress(SendResult::SuppressedQuietHours));
    }
}
