//! Route definitions for the `/chats` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::{chat, message};
use crate::state::AppState;

/// Routes mounted at `/chats`.
///
/// ```text
/// POST   /                        -> create_chat
/// GET    /                        -> list_chats
/// GET    /{chat_id}/messages      -> get_messages
/// DELETE /{chat_id}/messages      -> clear_chat
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(chat::list_chats).post(chat::create_chat))
        .route(
            "/{chat_id}/messages",
            get(message::get_messages).delete(message::clear_chat),
        )
}
