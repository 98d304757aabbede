//! In-process stores.
//!
//! Mirrors the Postgres semantics that matter to the engine: lock insertion
//! is atomic under a mutex, the send log is append-only and rejects a second
//! `accepted` row for the same user and event. Used by tests and local tools.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use matchday_core::catalog::DedupeScope;
use matchday_core::device::SubscriptionState;
use matchday_core::send_result::SendResult;
use matchday_core::types::{DbId, Timestamp, UserId};
use matchday_db::models::device::{DeviceRegistration, DeviceStateUpdate, NewDeviceRegistration};
use matchday_db::models::dispatch_lock::{DispatchLock, NewDispatchLock};
use matchday_db::models::preference::UserPreference;
use matchday_db::models::send_log::{NewSendLogEntry, SendLogEntry};

use crate::store::{
    Acquisition, AudienceDirectory, DeviceRegistry, DispatchLedger, PreferenceStore, StoreError,
};

#[derive(Default)]
struct State {
    next_id: DbId,
    locks: Vec<DispatchLock>,
    send_log: Vec<SendLogEntry>,
    devices: Vec<DeviceRegistration>,
    preferences: HashMap<UserId, UserPreference>,
    picks: HashMap<i64, BTreeSet<UserId>>,
    leagues: HashMap<Uuid, BTreeSet<UserId>>,
    failing_preference_reads: HashSet<UserId>,
}

impl State {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

/// Every store seam in memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---- Seeding ----

    pub fn add_pick(&self, fixture_id: i64, user_id: UserId) {
        self.state()
            .picks
            .entry(fixture_id)
            .or_default()
            .insert(user_id);
    }

    pub fn add_league_member(&self, league_id: Uuid, user_id: UserId) {
        self.state()
            .leagues
            .entry(league_id)
            .or_default()
            .insert(user_id);
    }

    pub fn set_preference(&self, user_id: UserId, preference_key: &str, enabled: bool) {
        let mut state = self.state();
        let entry = state
            .preferences
            .entry(user_id)
            .or_insert_with(|| UserPreference {
                user_id,
                preferences: serde_json::json!({}),
                updated_at: Utc::now(),
            });
        if let Some(map) = entry.preferences.as_object_mut() {
            map.insert(preference_key.to_string(), serde_json::Value::Bool(enabled));
        }
        entry.updated_at = Utc::now();
    }

    /// Make every preference read for `user_id` fail.
    pub fn fail_preference_reads(&self, user_id: UserId) {
        self.state().failing_preference_reads.insert(user_id);
    }

    /// Add an active, valid device in the given subscription state.
    pub fn add_device(
        &self,
        user_id: UserId,
        provider_device_id: &str,
        subscription: SubscriptionState,
    ) -> DbId {
        let mut state = self.state();
        let id = state.next_id();
        let now = Utc::now();
        state.devices.push(DeviceRegistration {
            id,
            user_id,
            provider_device_id: provider_device_id.to_string(),
            platform: "ios".to_string(),
            is_active: true,
            subscribed: subscription.to_column(),
            invalid: false,
            external_user_mismatch: false,
            last_checked_at: None,
            last_active_at: None,
            last_provider_state: None,
            created_at: now,
            updated_at: now,
        });
        id
    }

    // ---- Inspection ----

    pub fn send_log(&self) -> Vec<SendLogEntry> {
        self.state().send_log.clone()
    }

    pub fn locks(&self) -> Vec<DispatchLock> {
        self.state().locks.clone()
    }

    pub fn device(&self, provider_device_id: &str) -> Option<DeviceRegistration> {
        self.state()
            .devices
            .iter()
            .find(|d| d.provider_device_id == provider_device_id)
            .cloned()
    }
}

#[async_trait]
impl DispatchLedger for MemoryStore {
    async fn try_acquire(&self, lock: &NewDispatchLock) -> Result<Acquisition, StoreError> {
        let mut state = self.state();
        let taken = state.locks.iter().any(|existing| {
            existing.scope == lock.scope.as_str()
                && existing.event_id == lock.event_id
                && match lock.scope {
                    DedupeScope::Global => true,
                    DedupeScope::PerUserPerEvent => existing.user_id == lock.user_id,
                }
        });
        if taken {
            return Ok(Acquisition::AlreadyExists);
        }

        let id = state.next_id();
        state.locks.push(DispatchLock {
            id,
            scope: lock.scope.as_str().to_string(),
            notification_key: lock.notification_key.clone(),
            event_id: lock.event_id.clone(),
            user_id: lock.user_id,
            created_at: lock.created_at,
        });
        Ok(Acquisition::Acquired)
    }

    async fn record(&self, entry: &NewSendLogEntry) -> Result<DbId, StoreError> {
        let mut state = self.state();
        if entry.result == SendResult::Accepted {
            let duplicate = state.send_log.iter().any(|row| {
                row.result == SendResult::Accepted.as_str()
                    && row.user_id == entry.user_id
                    && row.event_id == entry.event_id
            });
            if duplicate {
                return Err(StoreError::Conflict(format!(
                    "accepted row already exists for event {}",
                    entry.event_id
                )));
            }
        }

        let id = state.next_id();
        state.send_log.push(SendLogEntry {
            id,
            user_id: entry.user_id,
            notification_key: entry.notification_key.clone(),
            event_id: entry.event_id.clone(),
            result: entry.result.as_str().to_string(),
            error_detail: entry.error_detail.clone(),
            targeting: entry.targeting.clone(),
            payload_summary: entry.payload_summary.clone(),
            created_at: entry.created_at,
        });
        Ok(id)
    }

    async fn has_accepted_since(
        &self,
        user_id: UserId,
        notification_key: &str,
        since: Timestamp,
    ) -> Result<bool, StoreError> {
        Ok(self.state().send_log.iter().any(|row| {
            row.user_id == Some(user_id)
                && row.notification_key == notification_key
                && row.result == SendResult::Accepted.as_str()
                && row.created_at >= since
        }))
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn get(&self, user_id: UserId) -> Result<Option<UserPreference>, StoreError> {
        let state = self.state();
        if state.failing_preference_reads.contains(&user_id) {
            return Err(StoreError::NotFound(format!(
                "preference store unavailable for {user_id}"
            )));
        }
        Ok(state.preferences.get(&user_id).cloned())
    }

    async fn users_with_enabled(&self, preference_key: &str) -> Result<Vec<UserId>, StoreError> {
        let mut users: Vec<UserId> = self
            .state()
            .preferences
            .values()
            .filter(|p| p.is_enabled(preference_key))
            .map(|p| p.user_id)
            .collect();
        users.sort();
        Ok(users)
    }

    async fn seed_defaults(
        &self,
        user_id: UserId,
        defaults: &serde_json::Value,
    ) -> Result<UserPreference, StoreError> {
        let mut state = self.state();
        let entry = state
            .preferences
            .entry(user_id)
            .or_insert_with(|| UserPreference {
                user_id,
                preferences: serde_json::json!({}),
                updated_at: Utc::now(),
            });
        if let (Some(existing), Some(defaults)) =
            (entry.preferences.as_object_mut(), defaults.as_object())
        {
            for (key, value) in defaults {
                existing.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }
}

#[async_trait]
impl DeviceRegistry for MemoryStore {
    async fn register(
        &self,
        input: &NewDeviceRegistration,
    ) -> Result<DeviceRegistration, StoreError> {
        let mut state = self.state();
        let now = Utc::now();
        if let Some(device) = state
            .devices
            .iter_mut()
            .find(|d| d.provider_device_id == input.provider_device_id)
        {
            device.user_id = input.user_id;
            device.platform = input.platform.clone();
            device.is_active = true;
            device.subscribed = None;
            device.invalid = false;
            device.external_user_mismatch = false;
            device.updated_at = now;
            return Ok(device.clone());
        }

        let id = state.next_id();
        let device = DeviceRegistration {
            id,
            user_id: input.user_id,
            provider_device_id: input.provider_device_id.clone(),
            platform: input.platform.clone(),
            is_active: true,
            subscribed: None,
            invalid: false,
            external_user_mismatch: false,
            last_checked_at: None,
            last_active_at: None,
            last_provider_state: None,
            created_at: now,
            updated_at: now,
        };
        state.devices.push(device.clone());
        Ok(device)
    }

    async fn devices_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<DeviceRegistration>, StoreError> {
        Ok(self
            .state()
            .devices
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn all_devices(&self) -> Result<Vec<DeviceRegistration>, StoreError> {
        Ok(self.state().devices.clone())
    }

    async fn devices_by_provider_ids(
        &self,
        provider_device_ids: &[String],
    ) -> Result<Vec<DeviceRegistration>, StoreError> {
        Ok(self
            .state()
            .devices
            .iter()
            .filter(|d| provider_device_ids.contains(&d.provider_device_id))
            .cloned()
            .collect())
    }

    async fn apply_state(&self, id: DbId, update: &DeviceStateUpdate) -> Result<(), StoreError> {
        let mut state = self.state();
        let device = state
            .devices
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("device registration {id}")))?;

        device.is_active = update.is_active;
        device.subscribed = update.subscription.to_column();
        device.invalid = update.invalid;
        device.external_user_mismatch = update.external_user_mismatch;
        if update.last_active_at.is_some() {
            device.last_active_at = update.last_active_at;
        }
        device.last_checked_at = Some(update.last_checked_at);
        device.last_provider_state = Some(update.provider_state.clone());
        device.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl AudienceDirectory for MemoryStore {
    async fn users_with_active_pick(&self, fixture_id: i64) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .state()
            .picks
            .get(&fixture_id)
            .map(|users| users.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn league_members(&self, league_id: Uuid) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .state()
            .leagues
            .get(&league_id)
            .map(|users| users.iter().copied().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;

    use super::*;

    fn lock(scope: DedupeScope, event_id: &str, user_id: Option<UserId>) -> NewDispatchLock {
        NewDispatchLock {
            scope,
            notification_key: "goal-scored".into(),
            event_id: event_id.into(),
            user_id,
            created_at: Utc::now(),
        }
    }

    fn accepted(user_id: UserId, event_id: &str) -> NewSendLogEntry {
        NewSendLogEntry {
            user_id: Some(user_id),
            notification_key: "goal-scored".into(),
            event_id: event_id.into(),
            result: SendResult::Accepted,
            error_detail: None,
            targeting: serde_json::json!({}),
            payload_summary: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn concurrent_global_acquire_has_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .try_acquire(&lock(DedupeScope::Global, "goal:1:23", None))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() == Acquisition::Acquired {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.locks().len(), 1);
    }

    #[tokio::test]
    async fn per_user_locks_are_independent() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        let scope = DedupeScope::PerUserPerEvent;

        assert_eq!(
            store.try_acquire(&lock(scope, "chat:1", Some(a))).await.unwrap(),
            Acquisition::Acquired
        );
        assert_eq!(
            store.try_acquire(&lock(scope, "chat:1", Some(b))).await.unwrap(),
            Acquisition::Acquired
        );
        assert_eq!(
            store.try_acquire(&lock(scope, "chat:1", Some(a))).await.unwrap(),
            Acquisition::AlreadyExists
        );
    }

    #[tokio::test]
    async fn second_accepted_row_is_a_conflict() {
        let store = MemoryStore::new();
        let user = Uuid::from_u128(1);
        store.record(&accepted(user, "goal:1:23")).await.unwrap();
        assert_matches!(
            store.record(&accepted(user, "goal:1:23")).await,
            Err(StoreError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn seeding_keeps_existing_choices() {
        let store = MemoryStore::new();
        let user = Uuid::from_u128(1);
        store.set_preference(user, "chat", false);

        let seeded = store
            .seed_defaults(user, &serde_json::json!({"chat": true, "goals": true}))
            .await
            .unwrap();
        assert!(!seeded.is_enabled("chat"));
        assert!(seeded.is_enabled("goals"));
    }
}
