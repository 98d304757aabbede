//! Event dispatch: catalog lookup, audience fan-out, suppression, delivery
//! and the send log.
//!
//! For one event the [`Dispatcher`]:
//!
//! 1. looks up the type (unknown key is fatal, a disabled type is a no-op),
//! 2. renders the event id, grouping ids, deep link and payload (missing
//!    parameters are fatal, nothing has been written yet),
//! 3. resolves the audience and applies the rollout gate (users outside the
//!    rollout leave no row at all),
//! 4. drops the whole event as `suppressed_stale` once it is older than the
//!    type's TTL,
//! 5. for global scope, claims the single event lock; losing it records one
//!    `suppressed_duplicate` row for the event and stops,
//! 6. runs [`SuppressionFilter`] and delivery for each selected user with
//!    bounded concurrency, appending exactly one send-log row per user.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use matchday_core::catalog::{Catalog, DedupeScope, NotificationType};
use matchday_core::send_result::SendResult;
use matchday_core::suppression::{is_stale, rollout_selects};
use matchday_core::types::{Timestamp, UserId};
use matchday_db::models::dispatch_lock::NewDispatchLock;
use matchday_db::models::send_log::NewSendLogEntry;

use crate::audience::AudienceResolver;
use crate::config::EngineConfig;
use crate::delivery::adapter::{render_grouping, render_payload};
use crate::delivery::{
    DeliveryAdapter, DeliveryOutcome, DeviceSendOutcome, GroupingMetadata, PushPayload,
    PushProvider,
};
use crate::error::DispatchError;
use crate::event::EventContext;
use crate::filter::{SuppressionFilter, Verdict};
use crate::store::{Acquisition, DispatchLedger, Stores};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Candidates processed concurrently within one event.
    pub concurrency: usize,
    pub quiet_hours_offset: FixedOffset,
    /// Upper bound on one provider send.
    pub send_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            concurrency: EngineConfig::DEFAULT_DISPATCH_CONCURRENCY,
            quiet_hours_offset: Utc.fix(),
            send_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&EngineConfig> for DispatchSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            concurrency: config.dispatch_concurrency,
            quiet_hours_offset: config.quiet_hours_offset,
            send_timeout: config.provider.timeout,
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Result for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateOutcome {
    pub user_id: UserId,
    pub result: SendResult,
    pub error_detail: Option<String>,
    /// Whether a per-user send-log row was written. `false` when the row
    /// insert failed, and for every user of a lost global lock (which is
    /// recorded as a single event-level row).
    pub logged: bool,
}

/// Summary of one dispatch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub notification_key: String,
    /// `None` when the type is disabled and nothing was rendered.
    pub event_id: Option<String>,
    pub disabled: bool,
    /// Audience size before the rollout gate.
    pub candidates: usize,
    pub rollout_excluded: usize,
    /// One entry per selected user, in user id order.
    pub outcomes: Vec<CandidateOutcome>,
}

impl DispatchReport {
    fn disabled(notification_key: &str) -> Self {
        Self {
            notification_key: notification_key.to_string(),
            event_id: None,
            disabled: true,
            candidates: 0,
            rollout_excluded: 0,
            outcomes: Vec::new(),
        }
    }

    pub fn count(&self, result: SendResult) -> usize {
        self.outcomes.iter().filter(|o| o.result == result).count()
    }

    pub fn result_for(&self, user_id: UserId) -> Option<SendResult> {
        self.outcomes
            .iter()
            .find(|o| o.user_id == user_id)
            .map(|o| o.result)
    }
}

/// Re-run an event under a fresh dedup key.
#[derive(Debug, Clone)]
pub struct ReplayRequest {
    /// Appended to the rendered event id as `{event_id}:replay:{tag}`.
    pub tag: String,
    /// Restrict the replay to these users instead of re-resolving the
    /// audience (typically the users whose previous result was `failed`).
    pub recipients: Option<Vec<UserId>>,
}

impl ReplayRequest {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            recipients: None,
        }
    }

    pub fn for_users(mut self, users: impl IntoIterator<Item = UserId>) -> Self {
        self.recipients = Some(users.into_iter().collect());
        self
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Everything rendered once per event and shared by all candidates.
struct Prepared<'a> {
    ntype: &'a NotificationType,
    event_id: String,
    payload: PushPayload,
    grouping: GroupingMetadata,
    targeting: serde_json::Value,
}

pub struct Dispatcher {
    catalog: Arc<Catalog>,
    audience: AudienceResolver,
    filter: SuppressionFilter,
    ledger: Arc<dyn DispatchLedger>,
    delivery: DeliveryAdapter,
    concurrency: usize,
}

impl Dispatcher {
    pub fn new(
        catalog: Arc<Catalog>,
        stores: Stores,
        provider: Arc<dyn PushProvider>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            catalog,
            audience: AudienceResolver::new(stores.audience, stores.preferences.clone()),
            filter: SuppressionFilter::new(
                stores.ledger.clone(),
                stores.preferences,
                stores.devices,
                settings.quiet_hours_offset,
            ),
            ledger: stores.ledger,
            delivery: DeliveryAdapter::new(provider, settings.send_timeout),
            concurrency: settings.concurrency.max(1),
        }
    }

    /// Dispatch one event now.
    pub async fn dispatch(
        &self,
        notification_key: &str,
        event: &EventContext,
    ) -> Result<DispatchReport, DispatchError> {
        self.run(notification_key, event, Utc::now(), None).await
    }

    /// Dispatch with an explicit clock. Every ledger row uses `now`.
    pub async fn dispatch_at(
        &self,
        notification_key: &str,
        event: &EventContext,
        now: Timestamp,
    ) -> Result<DispatchReport, DispatchError> {
        self.run(notification_key, event, now, None).await
    }

    /// Re-dispatch an event under `{event_id}:replay:{tag}`. All suppression
    /// rules still apply, staleness included.
    pub async fn replay(
        &self,
        notification_key: &str,
        event: &EventContext,
        request: &ReplayRequest,
    ) -> Result<DispatchReport, DispatchError> {
        self.run(notification_key, event, Utc::now(), Some(request))
            .await
    }

    pub async fn replay_at(
        &self,
        notification_key: &str,
        event: &EventContext,
        request: &ReplayRequest,
        now: Timestamp,
    ) -> Result<DispatchReport, DispatchError> {
        self.run(notification_key, event, now, Some(request)).await
    }

    async fn run(
        &self,
        notification_key: &str,
        event: &EventContext,
        now: Timestamp,
        replay: Option<&ReplayRequest>,
    ) -> Result<DispatchReport, DispatchError> {
        let ntype = self.catalog.lookup(notification_key)?;
        if !ntype.is_active() {
            tracing::info!(notification_key, "Notification type disabled, skipping dispatch");
            return Ok(DispatchReport::disabled(notification_key));
        }

        let mut event_id = ntype.trigger.event_id_format.render(&event.params)?;
        if let Some(replay) = replay {
            event_id = format!("{event_id}:replay:{}", replay.tag);
        }
        let grouping = render_grouping(ntype, &event.params)?;
        let payload = render_payload(ntype, event)?;

        let candidates: BTreeSet<UserId> = match replay.and_then(|r| r.recipients.as_ref()) {
            Some(users) => users.iter().copied().collect(),
            None => self.audience.resolve(ntype, event).await?,
        };
        let candidate_count = candidates.len();
        let (selected, excluded): (Vec<UserId>, Vec<UserId>) = candidates
            .into_iter()
            .partition(|user| rollout_selects(&ntype.rollout, &ntype.notification_key, *user));

        let prepared = Prepared {
            ntype,
            targeting: serde_json::json!({
                "trigger": ntype.trigger.name,
                "audience": ntype.audience.as_str(),
                "scope": ntype.scope().as_str(),
                "candidates": candidate_count,
                "selected": selected.len(),
                "rollout": {
                    "enabled": ntype.rollout.enabled,
                    "percentage": ntype.rollout.percentage,
                },
                "replay_tag": replay.map(|r| r.tag.as_str()),
            }),
            event_id,
            payload,
            grouping,
        };

        let mut report = DispatchReport {
            notification_key: notification_key.to_string(),
            event_id: Some(prepared.event_id.clone()),
            disabled: false,
            candidates: candidate_count,
            rollout_excluded: excluded.len(),
            outcomes: Vec::new(),
        };

        if selected.is_empty() {
            tracing::debug!(
                notification_key,
                event_id = %prepared.event_id,
                candidates = candidate_count,
                "No recipients selected"
            );
            return Ok(report);
        }

        if is_stale(event.occurred_at, now, ntype.ttl()) {
            tracing::info!(
                notification_key,
                event_id = %prepared.event_id,
                age_secs = (now - event.occurred_at).num_seconds(),
                "Event is stale, suppressing"
            );
            report.outcomes = self
                .fan_out(selected, |user| self.suppress_stale(&prepared, user, now))
                .await;
            return Ok(report);
        }

        if ntype.scope() == DedupeScope::Global {
            let lock = NewDispatchLock {
                scope: DedupeScope::Global,
                notification_key: ntype.notification_key.clone(),
                event_id: prepared.event_id.clone(),
                user_id: None,
                created_at: now,
            };
            if self.ledger.try_acquire(&lock).await? == Acquisition::AlreadyExists {
                tracing::info!(
                    notification_key,
                    event_id = %prepared.event_id,
                    "Global dispatch lock already held, suppressing duplicate"
                );
                self.record(&prepared, None, SendResult::SuppressedDuplicate, None, &[], now)
                    .await;
                report.outcomes = selected
                    .into_iter()
                    .map(|user_id| CandidateOutcome {
                        user_id,
                        result: SendResult::SuppressedDuplicate,
                        error_detail: None,
                        logged: false,
                    })
                    .collect();
                return Ok(report);
            }
        }

        report.outcomes = self
            .fan_out(selected, |user| self.process_candidate(&prepared, user, now))
            .await;

        tracing::info!(
            notification_key,
            event_id = %report.event_id.as_deref().unwrap_or_default(),
            candidates = report.candidates,
            rollout_excluded = report.rollout_excluded,
            accepted = report.count(SendResult::Accepted),
            failed = report.count(SendResult::Failed),
            "Dispatch complete"
        );
        Ok(report)
    }

    /// Run `task` for every user with bounded concurrency; results come back
    /// in user id order.
    async fn fan_out<F, Fut>(&self, users: Vec<UserId>, task: F) -> Vec<CandidateOutcome>
    where
        F: FnMut(UserId) -> Fut,
        Fut: std::future::Future<Output = CandidateOutcome>,
    {
        let mut outcomes: Vec<CandidateOutcome> = stream::iter(users)
            .map(task)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        outcomes.sort_by_key(|o| o.user_id);
        outcomes
    }

    async fn suppress_stale(
        &self,
        prepared: &Prepared<'_>,
        user_id: UserId,
        now: Timestamp,
    ) -> CandidateOutcome {
        let logged = self
            .record(prepared, Some(user_id), SendResult::SuppressedStale, None, &[], now)
            .await;
        CandidateOutcome {
            user_id,
            result: SendResult::SuppressedStale,
            error_detail: None,
            logged,
        }
    }

    async fn process_candidate(
        &self,
        prepared: &Prepared<'_>,
        user_id: UserId,
        now: Timestamp,
    ) -> CandidateOutcome {
        let verdict = self
            .filter
            .evaluate(prepared.ntype, &prepared.event_id, user_id, now)
            .await;

        let (result, error_detail, devices) = match verdict {
            Err(e) => {
                tracing::warn!(
                    notification_key = %prepared.ntype.notification_key,
                    event_id = %prepared.event_id,
                    %user_id,
                    error = %e,
                    "Store error while filtering candidate"
                );
                (SendResult::Failed, Some(format!("store error: {e}")), Vec::new())
            }
            Ok(Verdict::Suppress(result)) => (result, None, Vec::new()),
            Ok(Verdict::Deliver { device_ids }) => {
                match self
                    .delivery
                    .deliver(&device_ids, &prepared.payload, &prepared.grouping)
                    .await
                {
                    DeliveryOutcome::Accepted { devices } => (SendResult::Accepted, None, devices),
                    DeliveryOutcome::Failed { detail, devices } => {
                        tracing::warn!(
                            notification_key = %prepared.ntype.notification_key,
                            event_id = %prepared.event_id,
                            %user_id,
                            error = %detail,
                            "Push delivery failed"
                        );
                        (SendResult::Failed, Some(detail), devices)
                    }
                }
            }
        };

        let logged = self
            .record(
                prepared,
                Some(user_id),
                result,
                error_detail.clone(),
                &devices,
                now,
            )
            .await;

        CandidateOutcome {
            user_id,
            result,
            error_detail,
            logged,
        }
    }

    /// Append one send-log row. Failures are logged, never propagated: a
    /// ledger hiccup for one user must not abort the others.
    async fn record(
        &self,
        prepared: &Prepared<'_>,
        user_id: Option<UserId>,
        result: SendResult,
        error_detail: Option<String>,
        devices: &[DeviceSendOutcome],
        now: Timestamp,
    ) -> bool {
        let entry = NewSendLogEntry {
            user_id,
            notification_key: prepared.ntype.notification_key.clone(),
            event_id: prepared.event_id.clone(),
            result,
            error_detail,
            targeting: prepared.targeting.clone(),
            payload_summary: serde_json::json!({
                "title": prepared.payload.title,
                "url": prepared.payload.url,
                "grouping": prepared.grouping,
                "devices": devices,
            }),
            created_at: now,
        };

        match self.ledger.record(&entry).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(
                    notification_key = %entry.notification_key,
                    event_id = %entry.event_id,
                    user_id = ?user_id,
                    result = %result,
                    error = %e,
                    "Failed to write send-log row"
                );
                false
            }
        }
    }
}
