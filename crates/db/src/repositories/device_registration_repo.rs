//! Repository for the `device_registrations` table.

use matchday_core::types::{DbId, UserId};
use sqlx::PgPool;

use crate::models::device::{DeviceRegistration, DeviceStateUpdate, NewDeviceRegistration};

/// Column list for `device_registrations` queries.
const COLUMNS: &str = "id, user_id, provider_device_id, platform, is_active, subscribed, \
    invalid, external_user_mismatch, last_checked_at, last_active_at, last_provider_state, \
    created_at, updated_at";

/// Local mirror of provider devices.
///
/// Writers are limited to registration ([`Self::register`]) and the
/// reconciliation job ([`Self::apply_state`]).
pub struct DeviceRegistrationRepo;

impl DeviceRegistrationRepo {
    /// Register a device, or re-register an existing provider device id.
    ///
    /// Re-registration is an explicit act by the owning app install, so it
    /// reassigns the owner, reactivates the device and resets the
    /// subscription to pending until the provider confirms it again.
    pub async fn register(
        pool: &PgPool,
        input: &NewDeviceRegistration,
    ) -> Result<DeviceRegistration, sqlx::Error> {
        let query = format!(
            "INSERT INTO device_registrations (user_id, provider_device_id, platform) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (provider_device_id) DO UPDATE SET \
                user_id = EXCLUDED.user_id, \
                platform = EXCLUDED.platform, \
                is_active = true, \
                subscribed = NULL, \
                invalid = false, \
                external_user_mismatch = false, \
                updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DeviceRegistration>(&query)
            .bind(input.user_id)
            .bind(&input.provider_device_id)
            .bind(&input.platform)
            .fetch_one(pool)
            .await
    }

    /// All devices owned by a user.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: UserId,
    ) -> Result<Vec<DeviceRegistration>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM device_registrations \
             WHERE user_id = $1 \
             ORDER BY id"
        );
        sqlx::query_as::<_, DeviceRegistration>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Every registration, in id order.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<DeviceRegistration>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM device_registrations ORDER BY id");
        sqlx::query_as::<_, DeviceRegistration>(&query)
            .fetch_all(pool)
            .await
    }

    /// Registrations matching the given provider device ids.
    pub async fn list_by_provider_ids(
        pool: &PgPool,
        provider_device_ids: &[String],
    ) -> Result<Vec<DeviceRegistration>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM device_registrations \
             WHERE provider_device_id = ANY($1) \
             ORDER BY id"
        );
        sqlx::query_as::<_, DeviceRegistration>(&query)
            .bind(provider_device_ids)
            .fetch_all(pool)
            .await
    }

    /// Write provider-verified state. `user_id` is never touched here: a
    /// mismatch is only flagged.
    pub async fn apply_state(
        pool: &PgPool,
        id: DbId,
        update: &DeviceStateUpdate,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE device_registrations SET \
                is_active = $2, \
                subscribed = $3, \
                invalid = $4, \
                external_user_mismatch = $5, \
                last_active_at = COALESCE($6, last_active_at), \
                last_checked_at = $7, \
                last_provider_state = $8, \
                updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(update.is_active)
        .bind(update.subscription.to_column())
        .bind(update.invalid)
        .bind(update.external_user_mismatch)
        .bind(update.last_active_at)
        .bind(update.last_checked_at)
        .bind(&update.provider_state)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
