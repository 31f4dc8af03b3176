//! Repository for the `users` table.

use relay_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::UserSummary;

/// Columns for the compact summary shape.
const SUMMARY_COLUMNS: &str = "id, username, avatar, is_online, last_seen";

/// Provides read and presence-cache operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Find a user summary by internal ID.
    pub async fn find_summary_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<UserSummary>, sqlx::Error> {
        let query = format!("SELECT {SUMMARY_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserSummary>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Fetch summaries for a set of user ids. Order is unspecified.
    pub async fn summaries_by_ids(
        pool: &PgPool,
        ids: &[DbId],
    ) -> Result<Vec<UserSummary>, sqlx::Error> {
        let query = format!("SELECT {SUMMARY_COLUMNS} FROM users WHERE id = ANY($1)");
        sqlx::query_as::<_, UserSummary>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// Mark a user online in the presence cache.
    pub async fn set_online(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET is_online = TRUE WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Mark a user offline and stamp `last_seen`.
    pub async fn set_offline(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET is_online = FALSE, last_seen = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
