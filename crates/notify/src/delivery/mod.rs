//! Push delivery.
//!
//! [`PushProvider`] is the contract with the external push service;
//! [`HttpPushProvider`] speaks its JSON API. [`DeliveryAdapter`] wraps a
//! provider with a timeout and maps the outcome onto the send-result
//! taxonomy. Delivery is never retried here: a failure is logged as `failed`
//! and recovered through replay.

pub mod adapter;
pub mod http;
pub mod provider;

pub use adapter::{DeliveryAdapter, DeliveryOutcome};
pub use http::HttpPushProvider;
pub use provider::{
    DeviceSendOutcome, GroupingMetadata, ProviderDeviceState, ProviderError, PushPayload,
    PushProvider, RegisterDeviceRequest,
};
