//! Handlers for the `/chats` resource.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use relay_core::error::CoreError;
use relay_core::types::DbId;
use relay_db::models::chat::{Chat, ChatResponse};
use relay_db::repositories::{ChatRepo, UserRepo};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /chats`.
///
/// Direct chats name the other participant via `user_id`; group chats set
/// `is_group` and supply `group_name` plus `member_ids`.
#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    #[serde(default)]
    pub is_group: bool,
    pub user_id: Option<DbId>,
    pub group_name: Option<String>,
    #[serde(default)]
    pub member_ids: Vec<DbId>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/chats
///
/// Direct: find-or-create the unique chat for the member pair (200 when it
/// already exists, 201 when created). Group: create with the caller as
/// admin and member.
pub async fn create_chat(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateChatRequest>,
) -> AppResult<(StatusCode, Json<ChatResponse>)> {
    if !input.is_group {
        let other_id = input
            .user_id
            .ok_or_else(|| AppError::Core(CoreError::Validation("User ID required".into())))?;
        if other_id == user.user_id {
            return Err(AppError::Core(CoreError::Validation(
                "Cannot open a chat with yourself".into(),
            )));
        }
        if UserRepo::find_summary_by_id(&state.pool, other_id)
            .await?
            .is_none()
        {
            return Err(AppError::Core(CoreError::NotFound {
                entity: "user",
                id: other_id,
            }));
        }

        // Uniqueness invariant: at most one direct chat per unordered pair.
        if let Some(existing) =
            ChatRepo::find_direct_between(&state.pool, user.user_id, other_id).await?
        {
            let response = chat_response(&state, existing).await?;
            return Ok((StatusCode::OK, Json(response)));
        }

        let chat = ChatRepo::create_direct(&state.pool, user.user_id, other_id).await?;
        let response = chat_response(&state, chat).await?;
        return Ok((StatusCode::CREATED, Json(response)));
    }

    // Group chat path.
    let group_name = input
        .group_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let mut member_ids: Vec<DbId> = input
        .member_ids
        .iter()
        .copied()
        .filter(|id| *id != user.user_id)
        .collect();
    member_ids.sort_unstable();
    member_ids.dedup();

    let Some(group_name) = group_name else {
        return Err(AppError::Core(CoreError::Validation(
            "Group requires name and members".into(),
        )));
    };
    if member_ids.len() < 2 {
        return Err(AppError::Core(CoreError::Validation(
            "Group requires name and members".into(),
        )));
    }

    let chat = ChatRepo::create_group(&state.pool, user.user_id, group_name, &member_ids).await?;
    let response = chat_response(&state, chat).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/v1/chats
///
/// All chats the caller belongs to, most recently active first, with member
/// summaries (and the admin, for groups) populated.
pub async fn list_chats(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<Vec<ChatResponse>>> {
    let chats = ChatRepo::list_for_user(&state.pool, user.user_id).await?;

    let mut responses = Vec::with_capacity(chats.len());
    for chat in chats {
        responses.push(chat_response(&state, chat).await?);
    }
    Ok(Json(responses))
}

/// Populate member and admin summaries for a chat row.
async fn chat_response(state: &AppState, chat: Chat) -> Result<ChatResponse, AppError> {
    let member_ids = ChatRepo::member_ids(&state.pool, chat.id).await?;
    let members = UserRepo::summaries_by_ids(&state.pool, &member_ids).await?;
    let admin = match chat.admin_id {
        Some(admin_id) => members.iter().find(|m| m.id == admin_id).cloned(),
        None => None,
    };

    Ok(ChatResponse {
        id: chat.id,
        is_group: chat.is_group,
        group_name: chat.group_name,
        admin,
        members,
        created_at: chat.created_at,
        updated_at: chat.updated_at,
    })
}
