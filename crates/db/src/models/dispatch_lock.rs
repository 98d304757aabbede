//! Dedup lock rows.

use matchday_core::catalog::DedupeScope;
use matchday_core::types::{DbId, Timestamp, UserId};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `notification_dispatch_locks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DispatchLock {
    pub id: DbId,
    pub scope: String,
    pub notification_key: String,
    pub event_id: String,
    pub user_id: Option<UserId>,
    pub created_at: Timestamp,
}

/// Lock to claim. `user_id` must be `None` for global scope and `Some` for
/// per-user scope; the table enforces this.
#[derive(Debug, Clone)]
pub struct NewDispatchLock {
    pub scope: DedupeScope,
    pub notification_key: String,
    pub event_id: String,
    pub user_id: Option<UserId>,
    pub created_at: Timestamp,
}
