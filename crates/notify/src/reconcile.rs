//! Device registry reconciliation.
//!
//! Pulls each registered device's state from the push provider and writes it
//! back to the local mirror: subscription, validity, activity and whether the
//! provider's external user id still matches our owner. A mismatch is only
//! flagged; ownership is never rewritten here.
//!
//! Devices are checked in batches: batches run one after another, devices
//! within a batch concurrently. A failure on one device is collected in the
//! report and does not stop the run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use matchday_core::device::SubscriptionState;
use matchday_core::types::Timestamp;
use matchday_db::models::device::{DeviceRegistration, DeviceStateUpdate};

use crate::config::EngineConfig;
use crate::delivery::{ProviderError, PushProvider};
use crate::store::{DeviceRegistry, StoreError};

/// One device that could not be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceFailure {
    pub provider_device_id: String,
    pub error: String,
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// `true` when every requested device was reconciled.
    pub ok: bool,
    /// Device ids the run was asked to check.
    pub total_player_ids: usize,
    pub subscribed: usize,
    pub unsubscribed: usize,
    pub pending: usize,
    pub invalid: usize,
    pub mismatched: usize,
    pub failures: Vec<DeviceFailure>,
}

impl ReconcileReport {
    fn tally(&mut self, update: &DeviceStateUpdate) {
        match update.subscription {
            SubscriptionState::Subscribed => self.subscribed += 1,
            SubscriptionState::Unsubscribed => self.unsubscribed += 1,
            SubscriptionState::Pending => self.pending += 1,
        }
        if update.invalid {
            self.invalid += 1;
        }
        if update.external_user_mismatch {
            self.mismatched += 1;
        }
    }

    fn fail(&mut self, provider_device_id: &str, error: impl Into<String>) {
        self.failures.push(DeviceFailure {
            provider_device_id: provider_device_id.to_string(),
            error: error.into(),
        });
    }
}

pub struct ReconciliationJob {
    registry: Arc<dyn DeviceRegistry>,
    provider: Arc<dyn PushProvider>,
    batch_size: usize,
    /// Upper bound on one device-state call.
    timeout: Duration,
}

impl ReconciliationJob {
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        provider: Arc<dyn PushProvider>,
        batch_size: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            provider,
            batch_size: batch_size.max(1),
            timeout,
        }
    }

    pub fn from_config(
        config: &EngineConfig,
        registry: Arc<dyn DeviceRegistry>,
        provider: Arc<dyn PushProvider>,
    ) -> Self {
        Self::new(
            registry,
            provider,
            config.reconcile_batch_size,
            config.provider.timeout,
        )
    }

    /// Reconcile every registered device.
    pub async fn run(&self) -> Result<ReconcileReport, StoreError> {
        let devices = self.registry.all_devices().await?;
        let total = devices.len();
        Ok(self.reconcile_devices(devices, total, Vec::new()).await)
    }

    /// Reconcile the given provider device ids. Ids with no local
    /// registration are reported as failures.
    pub async fn reconcile(
        &self,
        provider_device_ids: &[String],
    ) -> Result<ReconcileReport, StoreError> {
        let requested: HashSet<&str> = provider_device_ids.iter().map(String::as_str).collect();
        let devices = self
            .registry
            .devices_by_provider_ids(provider_device_ids)
            .await?;

        let known: HashSet<&str> = devices
            .iter()
            .map(|d| d.provider_device_id.as_str())
            .collect();
        let mut unknown: Vec<String> = requested
            .difference(&known)
            .map(|id| id.to_string())
            .collect();
        unknown.sort();

        Ok(self.reconcile_devices(devices, requested.len(), unknown).await)
    }

    async fn reconcile_devices(
        &self,
        devices: Vec<DeviceRegistration>,
        total: usize,
        unknown: Vec<String>,
    ) -> ReconcileReport {
        let now = Utc::now();
        let mut report = ReconcileReport {
            total_player_ids: total,
            ..Default::default()
        };
        for id in &unknown {
            report.fail(id, "no local registration");
        }

        for batch in devices.chunks(self.batch_size) {
            let results = join_all(batch.iter().map(|device| self.check_device(device, now))).await;
            for (device, result) in batch.iter().zip(results) {
                match result {
                    Ok(update) => report.tally(&update),
                    Err(error) => {
                        tracing::warn!(
                            provider_device_id = %device.provider_device_id,
                            error = %error,
                            "Device reconciliation failed"
                        );
                        report.fail(&device.provider_device_id, error);
                    }
                }
            }
        }

        report.ok = report.failures.is_empty();
        tracing::info!(
            total = report.total_player_ids,
            subscribed = report.subscribed,
            unsubscribed = report.unsubscribed,
            pending = report.pending,
            invalid = report.invalid,
            mismatched = report.mismatched,
            failures = report.failures.len(),
            "Device reconciliation complete"
        );
        report
    }

    async fn check_device(
        &self,
        device: &DeviceRegistration,
        now: Timestamp,
    ) -> Result<DeviceStateUpdate, String> {
        let lookup = self.provider.get_device_state(&device.provider_device_id);
        let state = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        };

        let update = match state {
            Ok(state) => {
                let mismatch = state
                    .external_user_id
                    .as_deref()
                    .is_some_and(|ext| ext.parse::<Uuid>().ok() != Some(device.user_id));
                if mismatch {
                    tracing::warn!(
                        provider_device_id = %device.provider_device_id,
                        user_id = %device.user_id,
                        external_user_id = ?state.external_user_id,
                        "Provider external user id does not match device owner"
                    );
                }
                DeviceStateUpdate {
                    is_active: !state.invalid,
                    subscription: SubscriptionState::from_column(state.subscribed),
                    invalid: state.invalid,
                    external_user_mismatch: mismatch,
                    last_active_at: state.last_active,
                    last_checked_at: now,
                    provider_state: state.raw,
                }
            }
            Err(ProviderError::DeviceNotFound(_)) => DeviceStateUpdate {
                is_active: false,
                subscription: device.subscription(),
                invalid: true,
                external_user_mismatch: device.external_user_mismatch,
                last_active_at: None,
                last_checked_at: now,
                provider_state: serde_json::json!({ "error": "not_found" }),
            },
            Err(e) => return Err(e.to_string()),
        };

        self.registry
            .apply_state(device.id, &update)
            .await
            .map_err(|e| e.to_string())?;
        Ok(update)
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Runs [`ReconciliationJob::run`] on a fixed interval.
pub struct ReconcileScheduler {
    job: ReconciliationJob,
    interval: Duration,
}

impl ReconcileScheduler {
    pub fn new(job: ReconciliationJob, interval: Duration) -> Self {
        Self { job, interval }
    }

    /// Loop until `cancel` fires. The first run starts immediately.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            batch_size = self.job.batch_size,
            "Device reconciliation scheduler started"
        );
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Device reconciliation scheduler stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.job.run().await {
                        tracing::error!(error = %e, "Device reconciliation run failed");
                    }
                }
            }
        }
    }
}
