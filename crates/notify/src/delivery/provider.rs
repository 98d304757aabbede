//! Push provider contract.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use matchday_core::types::{Timestamp, UserId};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Network, DNS or TLS failure.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Push provider returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Push provider rate limited the request (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Push provider has no device {0}")]
    DeviceNotFound(String),

    #[error("Unexpected push provider response: {0}")]
    InvalidResponse(String),

    #[error("Push provider call timed out after {0:?}")]
    Timeout(Duration),
}

/// Device registration sent to the provider.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterDeviceRequest {
    /// Our user id, stored by the provider as its external user id.
    pub external_user_id: UserId,
    pub platform: String,
    pub token: String,
}

/// Provider-side state of one device.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProviderDeviceState {
    /// `None` while the provider has not yet confirmed the subscription.
    #[serde(default)]
    pub subscribed: Option<bool>,
    /// The push token was rejected by the platform.
    #[serde(default)]
    pub invalid: bool,
    #[serde(default)]
    pub external_user_id: Option<String>,
    #[serde(default)]
    pub last_active: Option<Timestamp>,
    /// Full provider response, kept for the audit column.
    #[serde(skip)]
    pub raw: serde_json::Value,
}

/// Content of one push.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    /// Rendered deep link, if the type declares one.
    pub url: Option<String>,
}

/// Rendered grouping identifiers. Absent fields are omitted on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupingMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapse_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_group: Option<String>,
}

/// Per-device result of a send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSendOutcome {
    pub device_id: String,
    pub accepted: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Register a push token and return the provider's device id.
    async fn register_device(&self, request: &RegisterDeviceRequest)
        -> Result<String, ProviderError>;

    async fn get_device_state(&self, provider_device_id: &str)
        -> Result<ProviderDeviceState, ProviderError>;

    /// Send one push to a set of devices belonging to a single user.
    async fn send(
        &self,
        device_ids: &[String],
        payload: &PushPayload,
        grouping: &GroupingMetadata,
    ) -> Result<Vec<DeviceSendOutcome>, ProviderError>;
}
