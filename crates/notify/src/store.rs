//! Storage seams used by the engine.
//!
//! The dispatcher and the reconciliation job only talk to these traits.
//! [`crate::postgres::PgStore`] backs them with the repositories in
//! `matchday-db`; [`crate::memory::MemoryStore`] keeps everything in process.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use matchday_core::types::{DbId, Timestamp, UserId};
use matchday_db::models::device::{DeviceRegistration, DeviceStateUpdate, NewDeviceRegistration};
use matchday_db::models::dispatch_lock::NewDispatchLock;
use matchday_db::models::preference::UserPreference;
use matchday_db::models::send_log::NewSendLogEntry;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness rule of the ledger was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Outcome of claiming a dispatch slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    Acquired,
    AlreadyExists,
}

/// Dedup locks plus the append-only send log.
#[async_trait]
pub trait DispatchLedger: Send + Sync {
    /// Atomically insert the lock row. Exactly one of any number of
    /// concurrent callers with the same key observes [`Acquisition::Acquired`].
    async fn try_acquire(&self, lock: &NewDispatchLock) -> Result<Acquisition, StoreError>;

    /// Append one send-log row.
    async fn record(&self, entry: &NewSendLogEntry) -> Result<DbId, StoreError>;

    /// Whether `user_id` has an `accepted` row for `notification_key` created
    /// at or after `since`.
    async fn has_accepted_since(
        &self,
        user_id: UserId,
        notification_key: &str,
        since: Timestamp,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, user_id: UserId) -> Result<Option<UserPreference>, StoreError>;

    /// Users whose preference for `preference_key` is explicitly enabled.
    async fn users_with_enabled(&self, preference_key: &str) -> Result<Vec<UserId>, StoreError>;

    /// Merge `defaults` (a `key -> bool` object) under the user's existing
    /// choices.
    async fn seed_defaults(
        &self,
        user_id: UserId,
        defaults: &serde_json::Value,
    ) -> Result<UserPreference, StoreError>;
}

#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn register(
        &self,
        input: &NewDeviceRegistration,
    ) -> Result<DeviceRegistration, StoreError>;

    async fn devices_for_user(&self, user_id: UserId)
        -> Result<Vec<DeviceRegistration>, StoreError>;

    async fn all_devices(&self) -> Result<Vec<DeviceRegistration>, StoreError>;

    async fn devices_by_provider_ids(
        &self,
        provider_device_ids: &[String],
    ) -> Result<Vec<DeviceRegistration>, StoreError>;

    /// Write provider-verified state. Never changes `user_id`.
    async fn apply_state(&self, id: DbId, update: &DeviceStateUpdate) -> Result<(), StoreError>;
}

/// Domain lookups backing the audience strategies.
#[async_trait]
pub trait AudienceDirectory: Send + Sync {
    async fn users_with_active_pick(&self, fixture_id: i64) -> Result<Vec<UserId>, StoreError>;

    async fn league_members(&self, league_id: Uuid) -> Result<Vec<UserId>, StoreError>;
}

/// The four store handles the engine needs.
#[derive(Clone)]
pub struct Stores {
    pub ledger: Arc<dyn DispatchLedger>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub devices: Arc<dyn DeviceRegistry>,
    pub audience: Arc<dyn AudienceDirectory>,
}

impl Stores {
    /// Use one backend for every seam.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: DispatchLedger + PreferenceStore + DeviceRegistry + AudienceDirectory + 'static,
    {
        Self {
            ledger: store.clone(),
            preferences: store.clone(),
            devices: store.clone(),
            audience: store,
        }
    }
}
