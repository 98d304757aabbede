//! Catalog definitions stored in the database.

use matchday_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `notification_catalog` table.
///
/// `definition` holds one catalog entry document; it is parsed and validated
/// by `matchday_core::catalog::Catalog::from_definitions`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CatalogRow {
    pub notification_key: String,
    pub definition: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
