//! WebSocket upgrade, handshake authentication, and the per-connection
//! lifecycle (presence transitions, reader/writer tasks, cleanup).

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use relay_core::error::CoreError;
use relay_db::models::user::UserSummary;
use relay_db::repositories::UserRepo;
use serde::Deserialize;

use crate::auth::jwt::validate_token;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::ws::dispatch;
use crate::ws::events::{ClientCommand, ServerEvent};

/// Handshake query parameters.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Access token; browsers cannot set headers on WebSocket upgrades,
    /// so the token rides in the query string.
    pub token: Option<String>,
}

/// HTTP handler that authenticates the handshake and upgrades to WebSocket.
///
/// The credential is taken from the `token` query parameter, falling back to
/// an `Authorization: Bearer` header. A missing or invalid credential
/// rejects the upgrade with 401; no application-level error payload is sent.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let token = query
        .token
        .or_else(|| {
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_string)
        })
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("Missing credential".into())))?;

    let claims = validate_token(&token, &state.config.jwt)
        .map_err(|_| AppError::Core(CoreError::Unauthorized("Invalid or expired token".into())))?;

    // The token may outlive the account; resolve it before accepting.
    let user = UserRepo::find_summary_by_id(&state.pool, claims.sub)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("Unknown user".into())))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

/// Manage a single authenticated connection after upgrade.
///
///   1. Registers with the [`ChatRegistry`](crate::ws::ChatRegistry); a
///      first connection marks the user online and broadcasts the
///      transition.
///   2. Spawns a writer task that drains the registry channel into the sink.
///   3. Processes inbound commands sequentially on the current task, which
///      is what gives a single sender persist-order == broadcast-order.
///   4. On disconnect, deregisters synchronously (leaving all rooms) before
///      any offline broadcast, so no later fan-out reaches a dead socket.
async fn handle_socket(socket: WebSocket, state: AppState, user: UserSummary) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let user_id = user.id;
    tracing::info!(conn_id = %conn_id, user_id, "WebSocket connected");

    let (mut rx, became_online) = state.registry.register(conn_id.clone(), user_id).await;

    if became_online {
        // Best-effort presence cache; the registry stays authoritative.
        if let Err(e) = UserRepo::set_online(&state.pool, user_id).await {
            tracing::error!(user_id, error = %e, "Failed to persist online transition");
        }
        state
            .registry
            .broadcast_except_user(user_id, &ServerEvent::UserOnline { user_id })
            .await;
    }

    let (mut sink, mut stream) = socket.split();

    // Writer task: forward channel messages to the WebSocket sink.
    let writer_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %writer_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Reader loop: parse and dispatch inbound commands.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(cmd) => dispatch::handle_command(&state, &conn_id, &user, cmd).await,
                Err(e) => {
                    // Malformed commands are dropped, matching the live
                    // path's silent error policy.
                    tracing::debug!(conn_id = %conn_id, error = %e, "Unparseable command");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: leave rooms and presence first, then the writer task.
    if let Some((_, went_offline)) = state.registry.deregister(&conn_id).await {
        if went_offline {
            if let Err(e) = UserRepo::set_offline(&state.pool, user_id).await {
                tracing::error!(user_id, error = %e, "Failed to persist offline transition");
            }
            state
                .registry
                .broadcast_except_user(
                    user_id,
                    &ServerEvent::UserOffline {
                        user_id,
                        last_seen: chrono::Utc::now(),
                    },
                )
                .await;
        }
    }
    send_task.abort();
    tracing::info!(conn_id = %conn_id, user_id, "WebSocket disconnected");
}
