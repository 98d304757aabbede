//! Read-only audience lookups against the product's league and pick tables.
//!
//! `league_members` and `picks` are owned by the league/pick services, not by
//! this engine's migrations. Only the columns used here are assumed:
//! `league_members (league_id UUID, user_id UUID, left_at TIMESTAMPTZ NULL)`
//! and `picks (fixture_id BIGINT, user_id UUID, status TEXT)`.

use matchday_core::types::UserId;
use sqlx::PgPool;
use uuid::Uuid;

/// Pick status that counts as "has an active pick".
pub const PICK_STATUS_ACTIVE: &str = "active";

/// Candidate-recipient queries used by the audience resolver.
pub struct AudienceRepo;

impl AudienceRepo {
    /// Distinct users with an active pick on a fixture.
    pub async fn users_with_active_pick(
        pool: &PgPool,
        fixture_id: i64,
    ) -> Result<Vec<UserId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT DISTINCT user_id FROM picks \
             WHERE fixture_id = $1 AND status = $2 \
             ORDER BY user_id",
        )
        .bind(fixture_id)
        .bind(PICK_STATUS_ACTIVE)
        .fetch_all(pool)
        .await
    }

    /// Current members of a league.
    pub async fn league_members(pool: &PgPool, league_id: Uuid) -> Result<Vec<UserId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT DISTINCT user_id FROM league_members \
             WHERE league_id = $1 AND left_at IS NULL \
             ORDER BY user_id",
        )
        .bind(league_id)
        .fetch_all(pool)
        .await
    }
}
