#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use matchday_core::catalog::Catalog;
use matchday_core::types::Timestamp;
use matchday_notify::delivery::{
    DeviceSendOutcome, GroupingMetadata, ProviderDeviceState, ProviderError, PushPayload,
    PushProvider, RegisterDeviceRequest,
};
use matchday_notify::dispatcher::DispatchSettings;
use matchday_notify::{Dispatcher, MemoryStore, Stores};

// ---- Catalog ----

pub const CATALOG: &str = r#"[
    {
        "notification_key": "chat-message",
        "owner": "social", "status": "active", "channels": ["push"], "source": "chat",
        "audience": "league-members-except-sender",
        "trigger": { "name": "chat.message.created", "event_id_format": "chat:{message_id}" },
        "dedupe": { "scope": "per_user_per_event", "ttl_seconds": 60 },
        "cooldown": { "per_user_seconds": 30 },
        "quiet_hours": { "start": "23:00", "end": "07:00" },
        "preferences": { "preference_key": "chat", "default": true },
        "grouping": { "thread_id_format": "league:{league_id}" },
        "deep_links": { "url_format": "matchday://leagues/{league_id}/chat" },
        "rollout": { "enabled": true, "percentage": 100 }
    },
    {
        "notification_key": "goal-scored",
        "owner": "live", "status": "active", "channels": ["push"], "source": "fixtures",
        "audience": "fixture-pickers",
        "trigger": { "name": "fixture.goal", "event_id_format": "goal:{fixture_id}:{minute}" },
        "dedupe": { "scope": "per_user_per_event", "ttl_seconds": 120 },
        "preferences": { "preference_key": "goals", "default": true },
        "grouping": { "collapse_id_format": "goal:{fixture_id}" }
    },
    {
        "notification_key": "gameweek-published",
        "owner": "game", "status": "active", "channels": ["push"], "source": "gameweeks",
        "audience": "preference-broadcast",
        "trigger": { "name": "gameweek.published", "event_id_format": "gw:{gameweek_id}" },
        "dedupe": { "scope": "global", "ttl_seconds": 86400 },
        "preferences": { "preference_key": "gameweek", "default": true }
    },
    {
        "notification_key": "league-submission-completed",
        "owner": "game", "status": "active", "channels": ["push"], "source": "submissions",
        "audience": "event-user",
        "trigger": { "name": "submission.completed", "event_id_format": "sub:{submission_id}" },
        "dedupe": { "scope": "per_user_per_event", "ttl_seconds": 3600 },
        "preferences": { "preference_key": "submissions", "default": true }
    },
    {
        "notification_key": "beta-feature",
        "owner": "growth", "status": "active", "channels": ["push"], "source": "admin",
        "audience": "event-user",
        "trigger": { "name": "beta.announced", "event_id_format": "beta:{campaign_id}" },
        "dedupe": { "scope": "per_user_per_event", "ttl_seconds": 3600 },
        "preferences": { "preference_key": "beta", "default": false },
        "rollout": { "enabled": true, "percentage": 0 }
    },
    {
        "notification_key": "legacy-digest",
        "owner": "growth", "status": "disabled", "channels": ["push"], "source": "digest",
        "audience": "event-user",
        "trigger": { "name": "digest.ready", "event_id_format": "digest:{digest_id}" },
        "dedupe": { "scope": "per_user_per_event", "ttl_seconds": 3600 },
        "preferences": { "preference_key": "digest", "default": true }
    }
]"#;

pub fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::from_json_str(CATALOG).expect("test catalog is valid"))
}

/// Saturday 14:00 UTC, outside the chat quiet hours.
pub fn afternoon() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 3, 14, 14, 0, 0).unwrap()
}

// ---- Mock provider ----

pub enum StateScript {
    State(ProviderDeviceState),
    NotFound,
    Error,
}

#[derive(Default)]
pub struct MockProvider {
    pub sends: Mutex<Vec<(Vec<String>, PushPayload, GroupingMetadata)>>,
    rejected: Mutex<HashSet<String>>,
    erroring: Mutex<HashSet<String>>,
    delay: Mutex<Duration>,
    states: Mutex<HashMap<String, StateScript>>,
    registrations: AtomicUsize,
    pub state_calls: AtomicUsize,
    state_delay: Mutex<Duration>,
    in_flight_states: AtomicUsize,
    /// Highest number of `get_device_state` calls running at once.
    pub peak_state_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The provider accepts the call but rejects this device's token.
    pub fn reject_device(&self, device_id: &str) {
        self.rejected.lock().unwrap().insert(device_id.to_string());
    }

    /// Any send that includes this device fails with HTTP 500.
    pub fn error_on_device(&self, device_id: &str) {
        self.erroring.lock().unwrap().insert(device_id.to_string());
    }

    pub fn clear_failures(&self) {
        self.rejected.lock().unwrap().clear();
        self.erroring.lock().unwrap().clear();
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn set_state_delay(&self, delay: Duration) {
        *self.state_delay.lock().unwrap() = delay;
    }

    pub fn script_state(&self, device_id: &str, script: StateScript) {
        self.states
            .lock()
            .unwrap()
            .insert(device_id.to_string(), script);
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().unwrap().len()
    }

    pub fn sent_devices(&self) -> Vec<String> {
        let mut devices: Vec<String> = self
            .sends
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(ids, _, _)| ids.clone())
            .collect();
        devices.sort();
        devices
    }
}

#[async_trait]
impl PushProvider for MockProvider {
    async fn register_device(
        &self,
        _request: &RegisterDeviceRequest,
    ) -> Result<String, ProviderError> {
        let n = self.registrations.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("dev-{n}"))
    }

    async fn get_device_state(
        &self,
        provider_device_id: &str,
    ) -> Result<ProviderDeviceState, ProviderError> {
        self.state_calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight_states.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_state_calls.fetch_max(running, Ordering::SeqCst);

        let delay = *self.state_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight_states.fetch_sub(1, Ordering::SeqCst);

        match self.states.lock().unwrap().get(provider_device_id) {
            Some(StateScript::State(state)) => Ok(state.clone()),
            Some(StateScript::NotFound) => {
                Err(ProviderError::DeviceNotFound(provider_device_id.to_string()))
            }
            Some(StateScript::Error) | None => Err(ProviderError::HttpStatus {
                status: 500,
                body: "internal error".into(),
            }),
        }
    }

    async fn send(
        &self,
        device_ids: &[String],
        payload: &PushPayload,
        grouping: &GroupingMetadata,
    ) -> Result<Vec<DeviceSendOutcome>, ProviderError> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.sends
            .lock()
            .unwrap()
            .push((device_ids.to_vec(), payload.clone(), grouping.clone()));

        if device_ids
            .iter()
            .any(|id| self.erroring.lock().unwrap().contains(id))
        {
            return Err(ProviderError::HttpStatus {
                status: 500,
                body: "internal error".into(),
            });
        }

        let rejected = self.rejected.lock().unwrap();
        Ok(device_ids
            .iter()
            .map(|id| DeviceSendOutcome {
                device_id: id.clone(),
                accepted: !rejected.contains(id),
                error: rejected.contains(id).then(|| "invalid token".to_string()),
            })
            .collect())
    }
}

// ---- Harness ----

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub provider: Arc<MockProvider>,
    pub dispatcher: Dispatcher,
}

pub fn harness() -> Harness {
    harness_with(DispatchSettings::default())
}

pub fn harness_with(settings: DispatchSettings) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let provider = MockProvider::new();
    let dispatcher = Dispatcher::new(
        catalog(),
        Stores::shared(store.clone()),
        provider.clone(),
        settings,
    );
    Harness {
        store,
        provider,
        dispatcher,
    }
}
