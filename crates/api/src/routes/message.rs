//! Route definitions for the `/messages` resource.

use axum::routing::{delete, post};
use axum::Router;

use crate::handlers::message;
use crate::state::AppState;

/// Routes mounted at `/messages`.
///
/// ```text
/// POST   /                -> send_message
/// DELETE /{message_id}    -> delete_message
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(message::send_message))
        .route("/{message_id}", delete(message::delete_message))
}
