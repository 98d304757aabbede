//! Postgres-backed stores.

use async_trait::async_trait;
use uuid::Uuid;

use matchday_core::types::{DbId, Timestamp, UserId};
use matchday_db::models::device::{DeviceRegistration, DeviceStateUpdate, NewDeviceRegistration};
use matchday_db::models::dispatch_lock::NewDispatchLock;
use matchday_db::models::preference::UserPreference;
use matchday_db::models::send_log::NewSendLogEntry;
use matchday_db::repositories::{
    AudienceRepo, DeviceRegistrationRepo, DispatchLockRepo, SendLogRepo, UserPreferenceRepo,
};
use matchday_db::DbPool;

use crate::store::{
    Acquisition, AudienceDirectory, DeviceRegistry, DispatchLedger, PreferenceStore, StoreError,
};

/// Every store seam over one connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Map unique violations on `uq_` constraints to [`StoreError::Conflict`].
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or("unknown");
            if constraint.starts_with("uq_") {
                return StoreError::Conflict(format!(
                    "Duplicate value violates unique constraint: {constraint}"
                ));
            }
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl DispatchLedger for PgStore {
    async fn try_acquire(&self, lock: &NewDispatchLock) -> Result<Acquisition, StoreError> {
        let acquired = DispatchLockRepo::try_acquire(&self.pool, lock)
            .await
            .map_err(classify)?;
        Ok(if acquired {
            Acquisition::Acquired
        } else {
            Acquisition::AlreadyExists
        })
    }

    async fn record(&self, entry: &NewSendLogEntry) -> Result<DbId, StoreError> {
        SendLogRepo::insert(&self.pool, entry).await.map_err(classify)
    }

    async fn has_accepted_since(
        &self,
        user_id: UserId,
        notification_key: &str,
        since: Timestamp,
    ) -> Result<bool, StoreError> {
        Ok(SendLogRepo::has_accepted_since(&self.pool, user_id, notification_key, since).await?)
    }
}

#[async_trait]
impl PreferenceStore for PgStore {
    async fn get(&self, user_id: UserId) -> Result<Option<UserPreference>, StoreError> {
        Ok(UserPreferenceRepo::get(&self.pool, user_id).await?)
    }

    async fn users_with_enabled(&self, preference_key: &str) -> Result<Vec<UserId>, StoreError> {
        Ok(UserPreferenceRepo::list_users_with_enabled(&self.pool, preference_key).await?)
    }

    async fn seed_defaults(
        &self,
        user_id: UserId,
        defaults: &serde_json::Value,
    ) -> Result<UserPreference, StoreError> {
        Ok(UserPreferenceRepo::seed_defaults(&self.pool, user_id, defaults).await?)
    }
}

#[async_trait]
impl DeviceRegistry for PgStore {
    async fn register(
        &self,
        input: &NewDeviceRegistration,
    ) -> Result<DeviceRegistration, StoreError> {
        DeviceRegistrationRepo::register(&self.pool, input)
            .await
            .map_err(classify)
    }

    async fn devices_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<DeviceRegistration>, StoreError> {
        Ok(DeviceRegistrationRepo::list_for_user(&self.pool, user_id).await?)
    }

    async fn all_devices(&self) -> Result<Vec<DeviceRegistration>, StoreError> {
        Ok(DeviceRegistrationRepo::list_all(&self.pool).await?)
    }

    async fn devices_by_provider_ids(
        &self,
        provider_device_ids: &[String],
    ) -> Result<Vec<DeviceRegistration>, StoreError> {
        Ok(DeviceRegistrationRepo::list_by_provider_ids(&self.pool, provider_device_ids).await?)
    }

    async fn apply_state(&self, id: DbId, update: &DeviceStateUpdate) -> Result<(), StoreError> {
        if DeviceRegistrationRepo::apply_state(&self.pool, id, update).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("device registration {id}")))
        }
    }
}

#[async_trait]
impl AudienceDirectory for PgStore {
    async fn users_with_active_pick(&self, fixture_id: i64) -> Result<Vec<UserId>, StoreError> {
        Ok(AudienceRepo::users_with_active_pick(&self.pool, fixture_id).await?)
    }

    async fn league_members(&self, league_id: Uuid) -> Result<Vec<UserId>, StoreError> {
        Ok(AudienceRepo::league_members(&self.pool, league_id).await?)
    }
}
