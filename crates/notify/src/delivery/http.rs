//! JSON-over-HTTP push provider client.
//!
//! Endpoints, relative to the configured base URL:
//!
//! - `POST /devices` registers a token and returns `{"id": ...}`.
//! - `GET /devices/{id}` returns the device state.
//! - `POST /notifications` sends one push to a list of devices and returns
//!   `{"results": [{"device_id", "accepted", "error"}]}`.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::provider::{
    DeviceSendOutcome, GroupingMetadata, ProviderDeviceState, ProviderError, PushPayload,
    PushProvider, RegisterDeviceRequest,
};
use crate::config::ProviderConfig;

#[derive(Deserialize)]
struct RegisterResponse {
    id: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    device_ids: &'a [String],
    #[serde(flatten)]
    payload: &'a PushPayload,
    #[serde(flatten)]
    grouping: &'a GroupingMetadata,
}

#[derive(Deserialize)]
struct SendResponse {
    results: Vec<DeviceSendOutcome>,
}

pub struct HttpPushProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpPushProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Turn a non-2xx response into a [`ProviderError`].
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::HttpStatus {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PushProvider for HttpPushProvider {
    async fn register_device(
        &self,
        request: &RegisterDeviceRequest,
    ) -> Result<String, ProviderError> {
        let response = self
            .request(reqwest::Method::POST, "/devices")
            .json(request)
            .send()
            .await?;
        let body: RegisterResponse = Self::check(response).await?.json().await?;
        Ok(body.id)
    }

    async fn get_device_state(
        &self,
        provider_device_id: &str,
    ) -> Result<ProviderDeviceState, ProviderError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/devices/{provider_device_id}"),
            )
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::DeviceNotFound(provider_device_id.to_string()));
        }

        let raw: serde_json::Value = Self::check(response).await?.json().await?;
        let mut state: ProviderDeviceState = serde_json::from_value(raw.clone())
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        state.raw = raw;
        Ok(state)
    }

    async fn send(
        &self,
        device_ids: &[String],
        payload: &PushPayload,
        grouping: &GroupingMetadata,
    ) -> Result<Vec<DeviceSendOutcome>, ProviderError> {
        let body = SendRequest {
            device_ids,
            payload,
            grouping,
        };
        let response = self
            .request(reqwest::Method::POST, "/notifications")
            .json(&body)
            .send()
            .await?;
        let parsed: SendResponse = Self::check(response).await?.json().await?;
        Ok(parsed.results)
    }
}
