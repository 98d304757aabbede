//! Device registration.

use std::sync::Arc;

use matchday_core::types::UserId;
use matchday_db::models::device::{DeviceRegistration, NewDeviceRegistration};

use crate::delivery::{ProviderError, PushProvider, RegisterDeviceRequest};
use crate::store::{DeviceRegistry, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Registers push tokens with the provider and mirrors them locally.
pub struct DeviceService {
    provider: Arc<dyn PushProvider>,
    registry: Arc<dyn DeviceRegistry>,
}

impl DeviceService {
    pub fn new(provider: Arc<dyn PushProvider>, registry: Arc<dyn DeviceRegistry>) -> Self {
        Self { provider, registry }
    }

    /// Register a token for `user_id`.
    ///
    /// The new registration starts pending. Registering a token the provider
    /// already knows under another user moves the device to `user_id`; this
    /// is the only path that reassigns ownership.
    pub async fn register(
        &self,
        user_id: UserId,
        platform: &str,
        push_token: &str,
    ) -> Result<DeviceRegistration, RegistrationError> {
        let provider_device_id = self
            .provider
            .register_device(&RegisterDeviceRequest {
                external_user_id: user_id,
                platform: platform.to_string(),
                token: push_token.to_string(),
            })
            .await?;

        let device = self
            .registry
            .register(&NewDeviceRegistration {
                user_id,
                provider_device_id,
                platform: platform.to_string(),
            })
            .await?;

        tracing::info!(
            %user_id,
            provider_device_id = %device.provider_device_id,
            platform,
            "Device registered"
        );
        Ok(device)
    }
}
