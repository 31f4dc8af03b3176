//! Handlers for the `/messages` resource and chat-scoped message history.
//!
//! Unlike the live channel, this path surfaces structured errors
//! (400/403/404/500) for the same validation and persistence steps.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use relay_core::error::CoreError;
use relay_core::types::DbId;
use relay_db::models::message::{CreateMessage, Message, MessageResponse, NewAttachment};
use relay_db::models::user::UserSummary;
use relay_db::repositories::{ChatRepo, MessageRepo, UserRepo};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Default and maximum history page sizes.
const DEFAULT_PAGE_LIMIT: i64 = 20;
const MAX_PAGE_LIMIT: i64 = 100;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /messages`.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub chat_id: DbId,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<NewAttachment>,
}

/// Query parameters for `GET /chats/{chat_id}/messages`.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/messages
///
/// REST send path: same validation and persistence as the live path, but
/// with structured errors. Fan-out stays on the socket path.
pub async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let content = input.content.trim().to_string();
    if content.is_empty() && input.attachments.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Chat ID and content required".into(),
        )));
    }

    if !ChatRepo::is_member(&state.pool, input.chat_id, user.user_id).await? {
        return Err(AppError::Core(CoreError::Forbidden("Access denied".into())));
    }

    let message = MessageRepo::create(
        &state.pool,
        &CreateMessage {
            chat_id: input.chat_id,
            sender_id: user.user_id,
            content,
            attachments: input.attachments,
        },
    )
    .await?;

    ChatRepo::touch(&state.pool, input.chat_id).await?;

    let sender = UserRepo::find_summary_by_id(&state.pool, user.user_id)
        .await?
        .ok_or_else(|| AppError::InternalError("Sender row vanished".into()))?;
    let attachments = MessageRepo::attachments_for(&state.pool, &[message.id]).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            id: message.id,
            chat_id: message.chat_id,
            sender,
            content: message.content,
            message_type: message.message_type,
            attachments,
            read_by: vec![user.user_id],
            created_at: message.created_at,
        }),
    ))
}

/// GET /api/v1/chats/{chat_id}/messages?page=&limit=
///
/// Membership-checked history bootstrap. Page 1 is the most recent `limit`
/// messages; the page itself is returned oldest-to-newest with sender
/// summaries, attachments, and read-by sets populated.
pub async fn get_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(chat_id): Path<DbId>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<MessageResponse>>> {
    if !ChatRepo::is_member(&state.pool, chat_id, user.user_id).await? {
        return Err(AppError::Core(CoreError::Forbidden("Access denied".into())));
    }

    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT);

    let messages = MessageRepo::list_by_chat(&state.pool, chat_id, page, limit).await?;
    let responses = populate_messages(&state, messages).await?;
    Ok(Json(responses))
}

/// DELETE /api/v1/messages/{message_id}
///
/// Sender-only deletion.
pub async fn delete_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(message_id): Path<DbId>,
) -> AppResult<StatusCode> {
    let message = MessageRepo::find_by_id(&state.pool, message_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "message",
            id: message_id,
        }))?;

    if message.sender_id != user.user_id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Not authorized".into(),
        )));
    }

    MessageRepo::delete(&state.pool, message_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/chats/{chat_id}/messages
///
/// Clear a chat's history in bulk, membership-checked.
pub async fn clear_chat(
    State(state): State<AppState>,
    user: AuthUser,
    Path(chat_id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !ChatRepo::is_member(&state.pool, chat_id, user.user_id).await? {
        return Err(AppError::Core(CoreError::Forbidden("Access denied".into())));
    }

    let removed = MessageRepo::clear_chat(&state.pool, chat_id).await?;
    tracing::info!(chat_id, removed, "Chat history cleared");
    Ok(StatusCode::NO_CONTENT)
}

/// Batch-populate sender summaries, attachments, and read-by sets for a
/// page of message rows.
async fn populate_messages(
    state: &AppState,
    messages: Vec<Message>,
) -> Result<Vec<MessageResponse>, AppError> {
    if messages.is_empty() {
        return Ok(Vec::new());
    }

    let message_ids: Vec<DbId> = messages.iter().map(|m| m.id).collect();
    let mut sender_ids: Vec<DbId> = messages.iter().map(|m| m.sender_id).collect();
    sender_ids.sort_unstable();
    sender_ids.dedup();

    let senders: HashMap<DbId, UserSummary> =
        UserRepo::summaries_by_ids(&state.pool, &sender_ids)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

    let mut attachments: HashMap<DbId, Vec<_>> = HashMap::new();
    for att in MessageRepo::attachments_for(&state.pool, &message_ids).await? {
        attachments.entry(att.message_id).or_default().push(att);
    }

    let mut read_by: HashMap<DbId, Vec<DbId>> = HashMap::new();
    for (message_id, user_id) in MessageRepo::read_by_for(&state.pool, &message_ids).await? {
        read_by.entry(message_id).or_default().push(user_id);
    }

    let mut responses = Vec::with_capacity(messages.len());
    for message in messages {
        let sender = senders.get(&message.sender_id).cloned().ok_or_else(|| {
            AppError::InternalError(format!("Sender {} missing for message", message.sender_id))
        })?;
        responses.push(MessageResponse {
            id: message.id,
            chat_id: message.chat_id,
            sender,
            content: message.content,
            message_type: message.message_type,
            attachments: attachments.remove(&message.id).unwrap_or_default(),
            read_by: read_by.remove(&message.id).unwrap_or_default(),
            created_at: message.created_at,
        });
    }
    Ok(responses)
}
