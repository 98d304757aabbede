//! Repository for the `notification_catalog` table.

use sqlx::PgPool;

use crate::models::catalog::CatalogRow;

/// Column list for `notification_catalog` queries.
const COLUMNS: &str = "notification_key, definition, created_at, updated_at";

/// Reads and deploys catalog definitions. The engine only reads; `upsert`
/// exists for deployment tooling and tests.
pub struct CatalogRepo;

impl CatalogRepo {
    /// List every stored definition in key order.
    pub async fn list(pool: &PgPool) -> Result<Vec<CatalogRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM notification_catalog ORDER BY notification_key");
        sqlx::query_as::<_, CatalogRow>(&query).fetch_all(pool).await
    }

    /// Insert or replace one definition.
    pub async fn upsert(
        pool: &PgPool,
        notification_key: &str,
        definition: &serde_json::Value,
    ) -> Result<CatalogRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO notification_catalog (notification_key, definition) \
             VALUES ($1, $2) \
             ON CONFLICT (notification_key) DO UPDATE SET \
                definition = EXCLUDED.definition, \
                updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CatalogRow>(&query)
            .bind(notification_key)
            .bind(definition)
            .fetch_one(pool)
            .await
    }
}
