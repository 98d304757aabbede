//! Repository for the `notification_dispatch_locks` table.

use sqlx::PgPool;

use crate::models::dispatch_lock::{DispatchLock, NewDispatchLock};

/// Column list for `notification_dispatch_locks` queries.
const COLUMNS: &str = "id, scope, notification_key, event_id, user_id, created_at";

/// Claims dedup slots.
pub struct DispatchLockRepo;

impl DispatchLockRepo {
    /// Atomically claim a dedup slot.
    ///
    /// A single `INSERT ... ON CONFLICT DO NOTHING` against the partial
    /// unique indexes `uq_dispatch_locks_global` / `uq_dispatch_locks_user_event`.
    /// Returns `true` when this caller inserted the row, `false` when the
    /// slot was already taken. Safe under any number of concurrent writers,
    /// including separate processes.
    pub async fn try_acquire(pool: &PgPool, lock: &NewDispatchLock) -> Result<bool, sqlx::Error> {
        let inserted: Option<i64> = sqlx::query_scalar(
            "INSERT INTO notification_dispatch_locks \
                (scope, notification_key, event_id, user_id, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT DO NOTHING \
             RETURNING id",
        )
        .bind(lock.scope.as_str())
        .bind(&lock.notification_key)
        .bind(&lock.event_id)
        .bind(lock.user_id)
        .bind(lock.created_at)
        .fetch_optional(pool)
        .await?;
        Ok(inserted.is_some())
    }

    /// All locks recorded for an event id, oldest first.
    pub async fn list_for_event(
        pool: &PgPool,
        event_id: &str,
    ) -> Result<Vec<DispatchLock>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_dispatch_locks \
             WHERE event_id = $1 \
             ORDER BY id"
        );
        sqlx::query_as::<_, DispatchLock>(&query)
            .bind(event_id)
            .fetch_all(pool)
            .await
    }
}
