//! Pure suppression predicates (rollout, staleness, cooldown, quiet hours).
//!
//! No I/O: callers supply the clock and the stored facts. The dispatch
//! pipeline in `matchday-notify` applies these in a fixed order.

use chrono::FixedOffset;
use sha2::{Digest, Sha256};

use crate::catalog::{QuietHours, RolloutSpec};
use crate::types::{Timestamp, UserId};

/// Number of rollout buckets; `percentage` selects buckets `0..percentage`.
pub const ROLLOUT_BUCKETS: u64 = 100;

/// Deterministic rollout bucket in `0..100` for a user and notification key.
///
/// Keyed by both values so a user at the bottom of one type's rollout is not
/// systematically first for every other type.
pub fn rollout_bucket(notification_key: &str, user_id: UserId) -> u8 {
    let mut hasher = Sha256::new();
    hasher.update(notification_key.as_bytes());
    hasher.update(b":");
    hasher.update(user_id.as_bytes());
    let digest = hasher.finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) % ROLLOUT_BUCKETS) as u8
}

/// Whether the rollout gate selects this user.
pub fn rollout_selects(rollout: &RolloutSpec, notification_key: &str, user_id: UserId) -> bool {
    if !rollout.enabled {
        return true;
    }
    rollout_bucket(notification_key, user_id) < rollout.percentage
}

/// An event is stale once strictly more than `ttl` has elapsed since it
/// occurred.
pub fn is_stale(occurred_at: Timestamp, now: Timestamp, ttl: chrono::Duration) -> bool {
    now - occurred_at > ttl
}

/// Earliest `created_at` of an accepted send that still blocks a new one.
pub fn cooldown_window_start(now: Timestamp, cooldown: chrono::Duration) -> Timestamp {
    now - cooldown
}

/// Whether `now`, read on a wall clock at `offset`, falls inside the window.
pub fn in_quiet_hours(quiet: &QuietHours, now: Timestamp, offset: FixedOffset) -> bool {
    quiet.contains(now.with_timezone(&offset).time())
}
