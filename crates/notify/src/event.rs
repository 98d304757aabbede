//! Domain events handed to the dispatcher.

use serde::Serialize;

use matchday_core::types::{EventParams, Timestamp, UserId};

/// User-visible content of a push. Rendered by the producing service; the
/// engine only routes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    /// Extra key/value data passed through to the device.
    pub data: serde_json::Value,
}

impl NotificationContent {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// One occurrence of a business event.
///
/// `params` feed the catalog templates (event id, grouping, deep link) and
/// the audience strategy (`fixture_id`, `league_id`, `user_id`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventContext {
    pub params: EventParams,
    pub occurred_at: Timestamp,
    /// User who caused the event, if any (the chat sender, for instance).
    pub actor_user_id: Option<UserId>,
    pub content: NotificationContent,
}

impl EventContext {
    pub fn new(occurred_at: Timestamp, content: NotificationContent) -> Self {
        Self {
            params: EventParams::new(),
            occurred_at,
            actor_user_id: None,
            content,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    pub fn with_actor(mut self, user_id: UserId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn builder_stringifies_params() {
        let actor = Uuid::new_v4();
        let event = EventContext::new(Utc::now(), NotificationContent::new("Goal!", "1-0"))
            .with_param("fixture_id", 4512)
            .with_param("minute", "23")
            .with_actor(actor);

        assert_eq!(event.param("fixture_id"), Some("4512"));
        assert_eq!(event.param("minute"), Some("23"));
        assert_eq!(event.param("league_id"), None);
        assert_eq!(event.actor_user_id, Some(actor));
    }
}
