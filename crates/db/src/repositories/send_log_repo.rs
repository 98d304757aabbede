//! Repository for the append-only `notification_send_log` table.

use matchday_core::send_result::SendResult;
use matchday_core::types::{DbId, Timestamp, UserId};
use sqlx::PgPool;

use crate::models::send_log::{NewSendLogEntry, SendLogEntry};

/// Column list for `notification_send_log` queries.
const COLUMNS: &str = "id, user_id, notification_key, event_id, result, error_detail, \
    targeting, payload_summary, created_at";

/// Append and query send-log rows. Rows are never updated.
pub struct SendLogRepo;

impl SendLogRepo {
    /// Append one audit row, returning its ID.
    pub async fn insert(pool: &PgPool, entry: &NewSendLogEntry) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO notification_send_log \
                (user_id, notification_key, event_id, result, error_detail, \
                 targeting, payload_summary, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id",
        )
        .bind(entry.user_id)
        .bind(&entry.notification_key)
        .bind(&entry.event_id)
        .bind(entry.result.as_str())
        .bind(&entry.error_detail)
        .bind(&entry.targeting)
        .bind(&entry.payload_summary)
        .bind(entry.created_at)
        .fetch_one(pool)
        .await
    }

    /// Whether the user received an accepted send of this key at or after
    /// `since`. Backs the cooldown check.
    pub async fn has_accepted_since(
        pool: &PgPool,
        user_id: UserId,
        notification_key: &str,
        since: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS ( \
                SELECT 1 FROM notification_send_log \
                WHERE user_id = $1 \
                  AND notification_key = $2 \
                  AND result = $3 \
                  AND created_at >= $4 \
             )",
        )
        .bind(user_id)
        .bind(notification_key)
        .bind(SendResult::Accepted.as_str())
        .bind(since)
        .fetch_one(pool)
        .await
    }

    /// Every row written for an event id, oldest first.
    pub async fn list_for_event(
        pool: &PgPool,
        event_id: &str,
    ) -> Result<Vec<SendLogEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_send_log \
             WHERE event_id = $1 \
             ORDER BY id"
        );
        sqlx::query_as::<_, SendLogEntry>(&query)
            .bind(event_id)
            .fetch_all(pool)
            .await
    }
}
