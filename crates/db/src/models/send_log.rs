//! Send-log (audit ledger) models.

use matchday_core::send_result::SendResult;
use matchday_core::types::{DbId, Timestamp, UserId};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `notification_send_log` table. Rows are never updated.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SendLogEntry {
    pub id: DbId,
    pub user_id: Option<UserId>,
    pub notification_key: String,
    pub event_id: String,
    pub result: String,
    pub error_detail: Option<String>,
    pub targeting: serde_json::Value,
    pub payload_summary: serde_json::Value,
    pub created_at: Timestamp,
}

impl SendLogEntry {
    /// Parsed result; `None` only if the row predates the current taxonomy.
    pub fn send_result(&self) -> Option<SendResult> {
        self.result.parse().ok()
    }
}

/// Insert DTO for a send-log row.
#[derive(Debug, Clone)]
pub struct NewSendLogEntry {
    pub user_id: Option<UserId>,
    pub notification_key: String,
    pub event_id: String,
    pub result: SendResult,
    pub error_detail: Option<String>,
    pub targeting: serde_json::Value,
    pub payload_summary: serde_json::Value,
    pub created_at: Timestamp,
}
