//! Device registry mirror models.

use matchday_core::device::{DeviceStatus, SubscriptionState};
use matchday_core::types::{DbId, Timestamp, UserId};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `device_registrations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeviceRegistration {
    pub id: DbId,
    pub user_id: UserId,
    pub provider_device_id: String,
    pub platform: String,
    pub is_active: bool,
    pub subscribed: Option<bool>,
    pub invalid: bool,
    pub external_user_mismatch: bool,
    pub last_checked_at: Option<Timestamp>,
    pub last_active_at: Option<Timestamp>,
    pub last_provider_state: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl DeviceRegistration {
    pub fn subscription(&self) -> SubscriptionState {
        SubscriptionState::from_column(self.subscribed)
    }

    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            is_active: self.is_active,
            invalid: self.invalid,
            subscription: self.subscription(),
        }
    }
}

/// DTO for registering (or re-registering) a device.
#[derive(Debug, Clone)]
pub struct NewDeviceRegistration {
    pub user_id: UserId,
    pub provider_device_id: String,
    pub platform: String,
}

/// Provider-verified state written by the reconciliation job.
#[derive(Debug, Clone)]
pub struct DeviceStateUpdate {
    pub is_active: bool,
    pub subscription: SubscriptionState,
    pub invalid: bool,
    pub external_user_mismatch: bool,
    pub last_active_at: Option<Timestamp>,
    pub last_checked_at: Timestamp,
    pub provider_state: serde_json::Value,
}
