//! Command dispatch for the live channel.
//!
//! Every command validates, touches the store where needed, then fans out.
//! Failures on this path are logged and swallowed: the connection receives
//! no error acknowledgment (the REST path is the one that surfaces
//! structured errors).

use relay_core::types::DbId;
use relay_db::models::message::{CreateMessage, MessageResponse, NewAttachment};
use relay_db::models::user::UserSummary;
use relay_db::repositories::{ChatRepo, MessageRepo};

use crate::state::AppState;
use crate::ws::events::{ClientCommand, ServerEvent};

/// Handle a single inbound command from an authenticated connection.
pub async fn handle_command(
    state: &AppState,
    conn_id: &str,
    user: &UserSummary,
    cmd: ClientCommand,
) {
    match cmd {
        ClientCommand::JoinChat { chat_id } => {
            handle_join(state, conn_id, user.id, chat_id).await;
        }
        ClientCommand::SendMessage {
            chat_id,
            content,
            attachments,
        } => {
            handle_send(state, user, chat_id, content, attachments).await;
        }
        ClientCommand::Typing { chat_id } => {
            // Ephemeral relay: no persistence, no server-side expiry.
            // Receivers treat the indicator as self-expiring.
            if state.registry.is_in_room(conn_id, chat_id).await {
                state
                    .registry
                    .broadcast_to_room(
                        chat_id,
                        &ServerEvent::Typing {
                            chat_id,
                            user_id: user.id,
                            username: user.username.clone(),
                        },
                        Some(conn_id),
                    )
                    .await;
            }
        }
        ClientCommand::StopTyping { chat_id } => {
            if state.registry.is_in_room(conn_id, chat_id).await {
                state
                    .registry
                    .broadcast_to_room(
                        chat_id,
                        &ServerEvent::StopTyping {
                            chat_id,
                            user_id: user.id,
                        },
                        Some(conn_id),
                    )
                    .await;
            }
        }
        ClientCommand::MessageRead {
            chat_id,
            message_ids,
        } => {
            handle_message_read(state, conn_id, user.id, chat_id, message_ids).await;
        }
        ClientCommand::DeleteMessage {
            chat_id,
            message_id,
        } => {
            handle_delete(state, conn_id, user.id, chat_id, message_id).await;
        }
    }
}

/// Join a chat's room after validating stored membership.
///
/// A denied join is a silent no-op: the connection is never told, and it
/// will simply receive no events scoped to that chat.
async fn handle_join(state: &AppState, conn_id: &str, user_id: DbId, chat_id: DbId) {
    match ChatRepo::is_member(&state.pool, chat_id, user_id).await {
        Ok(true) => {
            state.registry.join_room(conn_id, chat_id).await;
            tracing::debug!(conn_id = %conn_id, user_id, chat_id, "Joined chat room");
        }
        Ok(false) => {
            tracing::debug!(conn_id = %conn_id, user_id, chat_id, "Join denied: not a member");
        }
        Err(e) => {
            tracing::error!(chat_id, error = %e, "Membership lookup failed on join");
        }
    }
}

/// Validate, persist, and fan out a message.
///
/// The broadcast goes to every connection in the room -- the sender's other
/// devices included -- exactly once per connection, carrying the
/// server-assigned id and timestamp.
async fn handle_send(
    state: &AppState,
    user: &UserSummary,
    chat_id: DbId,
    content: String,
    attachments: Vec<NewAttachment>,
) {
    let content = content.trim().to_string();
    if !is_sendable(&content, &attachments) {
        tracing::debug!(user_id = user.id, chat_id, "Dropped empty send");
        return;
    }

    match ChatRepo::is_member(&state.pool, chat_id, user.id).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!(user_id = user.id, chat_id, "Dropped send: not a member");
            return;
        }
        Err(e) => {
            tracing::error!(chat_id, error = %e, "Membership lookup failed on send");
            return;
        }
    }

    let input = CreateMessage {
        chat_id,
        sender_id: user.id,
        content,
        attachments,
    };
    let message = match MessageRepo::create(&state.pool, &input).await {
        Ok(m) => m,
        Err(e) => {
            // Fire-and-forget live path: log, emit nothing.
            tracing::error!(chat_id, user_id = user.id, error = %e, "Failed to persist message");
            return;
        }
    };

    if let Err(e) = ChatRepo::touch(&state.pool, chat_id).await {
        tracing::error!(chat_id, error = %e, "Failed to touch chat");
    }

    let stored = match MessageRepo::attachments_for(&state.pool, &[message.id]).await {
        Ok(atts) => atts,
        Err(e) => {
            tracing::error!(message_id = message.id, error = %e, "Failed to load attachments");
            Vec::new()
        }
    };

    let event = ServerEvent::ReceiveMessage {
        message: MessageResponse {
            id: message.id,
            chat_id: message.chat_id,
            sender: user.clone(),
            content: message.content,
            message_type: message.message_type,
            attachments: stored,
            read_by: vec![user.id],
            created_at: message.created_at,
        },
    };
    let delivered = state.registry.broadcast_to_room(chat_id, &event, None).await;
    tracing::debug!(chat_id, message_id = message.id, delivered, "Message fanned out");
}

/// Persist a read receipt and rebroadcast it to the room.
///
/// The store update is set-valued and idempotent; a repeated receipt is a
/// state no-op but is still relayed, matching the emitter's view.
async fn handle_message_read(
    state: &AppState,
    conn_id: &str,
    user_id: DbId,
    chat_id: DbId,
    message_ids: Vec<DbId>,
) {
    if message_ids.is_empty() || !state.registry.is_in_room(conn_id, chat_id).await {
        return;
    }

    if let Err(e) = MessageRepo::mark_read(&state.pool, chat_id, &message_ids, user_id).await {
        tracing::error!(chat_id, user_id, error = %e, "Failed to persist read receipt");
        return;
    }

    state
        .registry
        .broadcast_to_room(
            chat_id,
            &ServerEvent::MessageRead {
                chat_id,
                message_ids,
                user_id,
            },
            Some(conn_id),
        )
        .await;
}

/// Delete one of the user's own messages and notify the room.
///
/// The store delete and the broadcast are deliberately not transactional; a
/// failure between them leaves a divergence window closed by the next full
/// history fetch.
async fn handle_delete(
    state: &AppState,
    conn_id: &str,
    user_id: DbId,
    chat_id: DbId,
    message_id: DbId,
) {
    if !state.registry.is_in_room(conn_id, chat_id).await {
        return;
    }

    let message = match MessageRepo::find_by_id(&state.pool, message_id).await {
        Ok(Some(m)) => m,
        Ok(None) => {
            tracing::debug!(message_id, "Dropped delete: message not found");
            return;
        }
        Err(e) => {
            tracing::error!(message_id, error = %e, "Message lookup failed on delete");
            return;
        }
    };

    // Only the sender may delete, and only within the claimed chat.
    if message.sender_id != user_id || message.chat_id != chat_id {
        tracing::debug!(message_id, user_id, "Dropped delete: not authorized");
        return;
    }

    match MessageRepo::delete(&state.pool, message_id).await {
        Ok(true) => {
            state
                .registry
                .broadcast_to_room(
                    chat_id,
                    &ServerEvent::MessageDeleted {
                        chat_id,
                        message_id,
                    },
                    Some(conn_id),
                )
                .await;
        }
        Ok(false) => {
            tracing::debug!(message_id, "Delete raced: message already gone");
        }
        Err(e) => {
            tracing::error!(message_id, error = %e, "Failed to delete message");
        }
    }
}

/// A send must carry trimmed non-empty content or at least one attachment.
fn is_sendable(content: &str, attachments: &[NewAttachment]) -> bool {
    !content.is_empty() || !attachments.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment() -> NewAttachment {
        NewAttachment {
            url: "https://cdn.example/a.png".to_string(),
            kind: "image".to_string(),
            filename: None,
            size_bytes: None,
        }
    }

    #[test]
    fn empty_content_without_attachments_is_not_sendable() {
        assert!(!is_sendable("", &[]));
    }

    #[test]
    fn whitespace_only_content_is_trimmed_before_this_check() {
        // Callers trim first; the helper sees the trimmed form.
        assert!(!is_sendable("   ".trim(), &[]));
    }

    #[test]
    fn attachments_alone_are_sendable() {
        assert!(is_sendable("", &[attachment()]));
    }

    #[test]
    fn plain_text_is_sendable() {
        assert!(is_sendable("hi", &[]));
    }
}
