//! Catalog entry schema.
//!
//! One [`NotificationType`] per business event. Entries are deployed as
//! configuration (JSON) and never mutated at runtime.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::template::Template;

/// Wall-clock format used by `quiet_hours.start` / `quiet_hours.end`.
const QUIET_HOURS_FORMAT: &str = "%H:%M";

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeStatus {
    Active,
    Disabled,
}

/// Uniqueness scope of the dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupeScope {
    /// One lock per rendered event id, shared by every recipient.
    Global,
    /// One lock per (user, rendered event id).
    PerUserPerEvent,
}

impl DedupeScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::PerUserPerEvent => "per_user_per_event",
        }
    }
}

/// How an event expands into candidate recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AudienceStrategy {
    /// Users holding an active pick on the `fixture_id` parameter.
    FixturePickers,
    /// Members of `league_id`, excluding the event's actor.
    LeagueMembersExceptSender,
    /// Every member of `league_id`.
    LeagueMembers,
    /// Every user whose preference for the type's key is enabled.
    PreferenceBroadcast,
    /// The single user named by the `user_id` parameter.
    EventUser,
}

impl AudienceStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixturePickers => "fixture-pickers",
            Self::LeagueMembersExceptSender => "league-members-except-sender",
            Self::LeagueMembers => "league-members",
            Self::PreferenceBroadcast => "preference-broadcast",
            Self::EventUser => "event-user",
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TriggerSpec {
    #[validate(length(min = 1))]
    pub name: String,
    pub event_id_format: Template,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DedupeSpec {
    pub scope: DedupeScope,
    /// Freshness window and audit retention hint.
    #[validate(range(min = 1))]
    pub ttl_seconds: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownSpec {
    #[serde(default)]
    pub per_user_seconds: u32,
}

/// A daily wall-clock window. `start > end` wraps past midnight; `start ==
/// end` is an empty window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQuietHours", into = "RawQuietHours")]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietHours {
    pub fn contains(&self, local: NaiveTime) -> bool {
        if self.start <= self.end {
            local >= self.start && local < self.end
        } else {
            local >= self.start || local < self.end
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawQuietHours {
    start: String,
    end: String,
}

impl TryFrom<RawQuietHours> for QuietHours {
    type Error = String;

    fn try_from(raw: RawQuietHours) -> Result<Self, Self::Error> {
        let parse = |s: &str| {
            NaiveTime::parse_from_str(s, QUIET_HOURS_FORMAT)
                .map_err(|e| format!("invalid quiet-hours time {s:?}: {e}"))
        };
        Ok(Self {
            start: parse(&raw.start)?,
            end: parse(&raw.end)?,
        })
    }
}

impl From<QuietHours> for RawQuietHours {
    fn from(q: QuietHours) -> Self {
        Self {
            start: q.start.format(QUIET_HOURS_FORMAT).to_string(),
            end: q.end.format(QUIET_HOURS_FORMAT).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PreferenceSpec {
    #[validate(length(min = 1))]
    pub preference_key: String,
    /// Value written when a new user's preferences are seeded. Dispatch never
    /// falls back to it: a missing preference is always an opt-out.
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingSpec {
    #[serde(default)]
    pub collapse_id_format: Option<Template>,
    #[serde(default)]
    pub thread_id_format: Option<Template>,
    #[serde(default)]
    pub platform_group_format: Option<Template>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepLinkSpec {
    pub url_format: Template,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RolloutSpec {
    /// When `false` the percentage gate is off and every candidate is selected.
    pub enabled: bool,
    #[validate(range(max = 100))]
    pub percentage: u8,
}

impl Default for RolloutSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            percentage: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// NotificationType
// ---------------------------------------------------------------------------

/// A single catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NotificationType {
    #[validate(length(min = 1))]
    pub notification_key: String,
    pub owner: String,
    pub status: TypeStatus,
    #[serde(default)]
    pub channels: Vec<String>,
    pub audience: AudienceStrategy,
    pub source: String,
    #[validate(nested)]
    pub trigger: TriggerSpec,
    #[validate(nested)]
    pub dedupe: DedupeSpec,
    #[serde(default)]
    pub cooldown: CooldownSpec,
    #[serde(default)]
    pub quiet_hours: Option<QuietHours>,
    /// Every type is preference-gated; there is no always-on notification.
    #[validate(nested)]
    pub preferences: PreferenceSpec,
    #[serde(default)]
    pub grouping: GroupingSpec,
    #[serde(default)]
    pub deep_links: Option<DeepLinkSpec>,
    #[serde(default)]
    #[validate(nested)]
    pub rollout: RolloutSpec,
}

impl NotificationType {
    pub fn is_active(&self) -> bool {
        self.status == TypeStatus::Active
    }

    pub fn scope(&self) -> DedupeScope {
        self.dedupe.scope
    }

    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.dedupe.ttl_seconds))
    }

    /// `None` when the type has no cooldown.
    pub fn cooldown(&self) -> Option<chrono::Duration> {
        match self.cooldown.per_user_seconds {
            0 => None,
            secs => Some(chrono::Duration::seconds(i64::from(secs))),
        }
    }

    pub fn preference_key(&self) -> &str {
        &self.preferences.preference_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn overnight_window_wraps_midnight() {
        let q = QuietHours {
            start: hm(23, 0),
            end: hm(7, 0),
        };
        assert!(q.contains(hm(23, 0)));
        assert!(q.contains(hm(2, 30)));
        assert!(q.contains(hm(6, 59)));
        assert!(!q.contains(hm(7, 0)));
        assert!(!q.contains(hm(14, 0)));
    }

    #[test]
    fn daytime_window_is_half_open() {
        let q = QuietHours {
            start: hm(12, 0),
            end: hm(13, 0),
        };
        assert!(q.contains(hm(12, 0)));
        assert!(!q.contains(hm(13, 0)));
        assert!(!q.contains(hm(11, 59)));
    }

    #[test]
    fn equal_bounds_is_empty_window() {
        let q = QuietHours {
            start: hm(9, 0),
            end: hm(9, 0),
        };
        assert!(!q.contains(hm(9, 0)));
        assert!(!q.contains(hm(21, 0)));
    }

    #[test]
    fn quiet_hours_parse_and_print_hh_mm() {
        let q: QuietHours = serde_json::from_str(r#"{"start":"23:00","end":"07:00"}"#).unwrap();
        assert_eq!(q.start, hm(23, 0));
        assert_eq!(
            serde_json::to_value(q).unwrap(),
            serde_json::json!({"start": "23:00", "end": "07:00"})
        );
        assert!(serde_json::from_str::<QuietHours>(r#"{"start":"25:00","end":"07:00"}"#).is_err());
    }

    #[test]
    fn audience_identifiers_are_kebab_case() {
        let s: AudienceStrategy = serde_json::from_str("\"league-members-except-sender\"").unwrap();
        assert_eq!(s, AudienceStrategy::LeagueMembersExceptSender);
        assert_eq!(s.as_str(), "league-members-except-sender");
    }

    #[test]
    fn zero_cooldown_means_none() {
        let c = CooldownSpec::default();
        assert_eq!(c.per_user_seconds, 0);
    }
}
