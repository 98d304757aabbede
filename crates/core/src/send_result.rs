//! Outcome taxonomy recorded on every send-log row.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Exactly one of these is recorded per dispatch attempt.
///
/// The string forms match the `notification_send_log.result` check
/// constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendResult {
    Accepted,
    Failed,
    SuppressedDuplicate,
    SuppressedStale,
    SuppressedPreference,
    SuppressedUnsubscribed,
    SuppressedCooldown,
    SuppressedQuietHours,
}

impl SendResult {
    pub const ALL: [SendResult; 8] = [
        Self::Accepted,
        Self::Failed,
        Self::SuppressedDuplicate,
        Self::SuppressedStale,
        Self::SuppressedPreference,
        Self::SuppressedUnsubscribed,
        Self::SuppressedCooldown,
        Self::SuppressedQuietHours,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Failed => "failed",
            Self::SuppressedDuplicate => "suppressed_duplicate",
            Self::SuppressedStale => "suppressed_stale",
            Self::SuppressedPreference => "suppressed_preference",
            Self::SuppressedUnsubscribed => "suppressed_unsubscribed",
            Self::SuppressedCooldown => "suppressed_cooldown",
            Self::SuppressedQuietHours => "suppressed_quiet_hours",
        }
    }

    /// `true` for every `suppressed_*` outcome.
    pub fn is_suppressed(&self) -> bool {
        !matches!(self, Self::Accepted | Self::Failed)
    }
}

impl fmt::Display for SendResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SendResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("Unknown send result: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_form_matches_serde_form() {
        for result in SendResult::ALL {
            let json = serde_json::to_string(&result).unwrap();
            assert_eq!(json, format!("\"{}\"", result.as_str()));
            assert_eq!(result.as_str().parse::<SendResult>().unwrap(), result);
        }
    }

    #[test]
    fn only_accepted_and_failed_are_not_suppressions() {
        let delivered: Vec<_> = SendResult::ALL
            .into_iter()
            .filter(|r| !r.is_suppressed())
            .collect();
        assert_eq!(delivered, vec![SendResult::Accepted, SendResult::Failed]);
    }

    #[test]
    fn unknown_result_is_rejected() {
        assert!("delivered".parse::<SendResult>().is_err());
    }
}
