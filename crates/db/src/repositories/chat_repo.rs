//! Repository for the `chats` and `chat_members` tables.

use relay_core::types::DbId;
use sqlx::PgPool;

use crate::models::chat::Chat;

const COLUMNS: &str = "id, is_group, group_name, admin_id, created_at, updated_at";

/// Provides conversation lookup, creation, and membership checks.
pub struct ChatRepo;

impl ChatRepo {
    /// True iff the user belongs to the chat. Absent chats report `false`.
    pub async fn is_member(pool: &PgPool, chat_id: DbId, user_id: DbId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM chat_members WHERE chat_id = $1 AND user_id = $2)",
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// All member ids of a chat.
    pub async fn member_ids(pool: &PgPool, chat_id: DbId) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar("SELECT user_id FROM chat_members WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_all(pool)
            .await
    }

    /// Find the direct (one-to-one) chat between two users, if any.
    ///
    /// At most one such chat exists per unordered pair; `create_direct`
    /// callers must check here first.
    pub async fn find_direct_between(
        pool: &PgPool,
        a: DbId,
        b: DbId,
    ) -> Result<Option<Chat>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM chats c
             WHERE c.is_group = FALSE
               AND EXISTS (SELECT 1 FROM chat_members m WHERE m.chat_id = c.id AND m.user_id = $1)
               AND EXISTS (SELECT 1 FROM chat_members m WHERE m.chat_id = c.id AND m.user_id = $2)"
        );
        sqlx::query_as::<_, Chat>(&query)
            .bind(a)
            .bind(b)
            .fetch_optional(pool)
            .await
    }

    /// Create a direct chat between two users.
    pub async fn create_direct(pool: &PgPool, a: DbId, b: DbId) -> Result<Chat, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!("INSERT INTO chats (is_group) VALUES (FALSE) RETURNING {COLUMNS}");
        let chat = sqlx::query_as::<_, Chat>(&query).fetch_one(&mut *tx).await?;

        sqlx::query("INSERT INTO chat_members (chat_id, user_id) VALUES ($1, $2), ($1, $3)")
            .bind(chat.id)
            .bind(a)
            .bind(b)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(chat)
    }

    /// Create a group chat with the given admin, name, and members.
    ///
    /// The admin is always inserted as a member; duplicate ids in
    /// `member_ids` are absorbed by the membership primary key.
    pub async fn create_group(
        pool: &PgPool,
        admin_id: DbId,
        group_name: &str,
        member_ids: &[DbId],
    ) -> Result<Chat, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO chats (is_group, group_name, admin_id)
             VALUES (TRUE, $1, $2)
             RETURNING {COLUMNS}"
        );
        let chat = sqlx::query_as::<_, Chat>(&query)
            .bind(group_name)
            .bind(admin_id)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO chat_members (chat_id, user_id)
             SELECT $1, uid FROM UNNEST($2::BIGINT[]) AS uid
             ON CONFLICT DO NOTHING",
        )
        .bind(chat.id)
        .bind(member_ids)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO chat_members (chat_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(chat.id)
            .bind(admin_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(chat)
    }

    /// All chats the user belongs to, most recently active first.
    pub async fn list_for_user(pool: &PgPool, user_id: DbId) -> Result<Vec<Chat>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM chats c
             JOIN chat_members m ON m.chat_id = c.id
             WHERE m.user_id = $1
             ORDER BY c.updated_at DESC"
        );
        sqlx::query_as::<_, Chat>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Advance the chat's `updated_at`, called on every message send.
    pub async fn touch(pool: &PgPool, chat_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE chats SET updated_at = NOW() WHERE id = $1")
            .bind(chat_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
