pub mod chat;
pub mod health;
pub mod message;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                              WebSocket (token in query string)
///
/// /chats                           create (POST), list (GET)
/// /chats/{chat_id}/messages        history (GET), clear (DELETE)
///
/// /messages                        send (POST)
/// /messages/{message_id}           delete (DELETE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/chats", chat::router())
        .nest("/messages", message::router())
}
