//! Repository for the `messages`, `message_attachments`, and
//! `message_reads` tables.

use relay_core::types::DbId;
use sqlx::PgPool;

use crate::models::message::{CreateMessage, Message, MessageAttachment, MessageType};

const COLUMNS: &str = "id, chat_id, sender_id, content, message_type, created_at";

/// Provides message persistence and read-receipt aggregation.
pub struct MessageRepo;

impl MessageRepo {
    /// Persist a new message with its attachments.
    ///
    /// The sender is recorded in the read-by set atomically with the insert,
    /// so a freshly created message always has `read_by = {sender}`.
    pub async fn create(pool: &PgPool, input: &CreateMessage) -> Result<Message, sqlx::Error> {
        let message_type = MessageType::infer(&input.attachments);

        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO messages (chat_id, sender_id, content, message_type)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        let message = sqlx::query_as::<_, Message>(&query)
            .bind(input.chat_id)
            .bind(input.sender_id)
            .bind(&input.content)
            .bind(message_type.as_str())
            .fetch_one(&mut *tx)
            .await?;

        for att in &input.attachments {
            sqlx::query(
                "INSERT INTO message_attachments (message_id, url, kind, filename, size_bytes)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(message.id)
            .bind(&att.url)
            .bind(&att.kind)
            .bind(&att.filename)
            .bind(att.size_bytes)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("INSERT INTO message_reads (message_id, user_id) VALUES ($1, $2)")
            .bind(message.id)
            .bind(input.sender_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// Find a message by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Message>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM messages WHERE id = $1");
        sqlx::query_as::<_, Message>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// A page of a chat's history, returned oldest-to-newest.
    ///
    /// Page 1 is the most recent `limit` messages; higher pages reach
    /// further back, matching the history-bootstrap contract.
    pub async fn list_by_chat(
        pool: &PgPool,
        chat_id: DbId,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Message>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM messages
             WHERE chat_id = $1
             ORDER BY created_at DESC, id DESC
             OFFSET $2 LIMIT $3"
        );
        let mut page_rows = sqlx::query_as::<_, Message>(&query)
            .bind(chat_id)
            .bind((page - 1) * limit)
            .bind(limit)
            .fetch_all(pool)
            .await?;

        page_rows.reverse();
        Ok(page_rows)
    }

    /// Attachments for a set of messages.
    pub async fn attachments_for(
        pool: &PgPool,
        message_ids: &[DbId],
    ) -> Result<Vec<MessageAttachment>, sqlx::Error> {
        sqlx::query_as::<_, MessageAttachment>(
            "SELECT id, message_id, url, kind, filename, size_bytes
             FROM message_attachments
             WHERE message_id = ANY($1)
             ORDER BY id",
        )
        .bind(message_ids)
        .fetch_all(pool)
        .await
    }

    /// Read-by pairs `(message_id, user_id)` for a set of messages.
    pub async fn read_by_for(
        pool: &PgPool,
        message_ids: &[DbId],
    ) -> Result<Vec<(DbId, DbId)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT message_id, user_id FROM message_reads
             WHERE message_id = ANY($1)
             ORDER BY read_at",
        )
        .bind(message_ids)
        .fetch_all(pool)
        .await
    }

    /// Add `user_id` to the read-by set of every listed message in the chat.
    ///
    /// Set semantics: already-present entries are untouched, the set never
    /// shrinks. Ids outside `chat_id` are ignored. Returns the number of
    /// newly inserted rows.
    pub async fn mark_read(
        pool: &PgPool,
        chat_id: DbId,
        message_ids: &[DbId],
        user_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO message_reads (message_id, user_id)
             SELECT m.id, $3 FROM messages m
             WHERE m.id = ANY($2) AND m.chat_id = $1
             ON CONFLICT DO NOTHING",
        )
        .bind(chat_id)
        .bind(message_ids)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete a single message. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all messages in a chat. Returns the number removed.
    pub async fn clear_chat(pool: &PgPool, chat_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM messages WHERE chat_id = $1")
            .bind(chat_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
