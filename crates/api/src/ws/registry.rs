//! Connection registry: presence tracking, room membership, and fan-out.
//!
//! All process-wide realtime state lives behind one `RwLock` owned by
//! [`ChatRegistry`], shared as `Arc<ChatRegistry>` and passed by handle into
//! each connection task. Mutations for the same user or room are serialized
//! through the write lock, so a "became offline" transition can never race a
//! "became online" one, and a room broadcast can never observe a half-applied
//! join or leave.

use std::collections::{HashMap, HashSet};

use axum::extract::ws::Message;
use relay_core::types::DbId;
use tokio::sync::{mpsc, RwLock};

use crate::ws::events::ServerEvent;

/// Channel sender half for pushing messages to a WebSocket connection.
///
/// Unbounded so a slow receiver buffers in its own channel instead of
/// stalling delivery to the rest of a room.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// State for a single live connection.
struct Connection {
    /// Authenticated user behind this connection.
    user_id: DbId,
    /// Channel sender for outbound messages to this connection.
    sender: WsSender,
    /// Chat rooms this connection has successfully joined.
    rooms: HashSet<DbId>,
}

#[derive(Default)]
struct RegistryState {
    /// Connection id -> live connection.
    connections: HashMap<String, Connection>,
    /// User id -> that user's live connection ids (presence).
    users: HashMap<DbId, HashSet<String>>,
    /// Chat id -> connection ids currently joined to its room.
    rooms: HashMap<DbId, HashSet<String>>,
}

impl RegistryState {
    /// Remove a connection from every room it occupied and from its user's
    /// presence entry. Returns `(user_id, went_offline)`.
    fn detach(&mut self, conn_id: &str, conn: Connection) -> (DbId, bool) {
        for chat_id in &conn.rooms {
            if let Some(room) = self.rooms.get_mut(chat_id) {
                room.remove(conn_id);
                if room.is_empty() {
                    self.rooms.remove(chat_id);
                }
            }
        }

        let mut went_offline = false;
        if let Some(conns) = self.users.get_mut(&conn.user_id) {
            conns.remove(conn_id);
            if conns.is_empty() {
                self.users.remove(&conn.user_id);
                went_offline = true;
            }
        }
        (conn.user_id, went_offline)
    }
}

/// Manages all live WebSocket connections, their rooms, and user presence.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct ChatRegistry {
    state: RwLock<RegistryState>,
}

impl ChatRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Register a new connection for a user.
    ///
    /// Returns the receiver half of the message channel (for the caller to
    /// forward to the WebSocket sink) and whether this registration took the
    /// user from zero connections to one. Re-registering an existing
    /// connection id replaces the previous entry.
    pub async fn register(
        &self,
        conn_id: String,
        user_id: DbId,
    ) -> (mpsc::UnboundedReceiver<Message>, bool) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Connection {
            user_id,
            sender: tx,
            rooms: HashSet::new(),
        };

        let mut state = self.state.write().await;
        if let Some(old) = state.connections.remove(&conn_id) {
            state.detach(&conn_id, old);
        }
        let became_online = !state.users.contains_key(&user_id);
        state
            .users
            .entry(user_id)
            .or_default()
            .insert(conn_id.clone());
        state.connections.insert(conn_id, conn);
        (rx, became_online)
    }

    /// Remove a connection, leaving all of its rooms.
    ///
    /// Returns `(user_id, went_offline)` where `went_offline` is true iff
    /// this was the user's last connection. Unknown ids return `None`.
    pub async fn deregister(&self, conn_id: &str) -> Option<(DbId, bool)> {
        let mut state = self.state.write().await;
        let conn = state.connections.remove(conn_id)?;
        Some(state.detach(conn_id, conn))
    }

    /// Add a connection to a chat room.
    ///
    /// Membership authorization is the caller's responsibility; the registry
    /// only records the join. Returns `false` if the connection is gone.
    pub async fn join_room(&self, conn_id: &str, chat_id: DbId) -> bool {
        let mut state = self.state.write().await;
        let Some(conn) = state.connections.get_mut(conn_id) else {
            return false;
        };
        conn.rooms.insert(chat_id);
        state
            .rooms
            .entry(chat_id)
            .or_default()
            .insert(conn_id.to_string());
        true
    }

    /// True iff the connection has joined the chat's room.
    pub async fn is_in_room(&self, conn_id: &str, chat_id: DbId) -> bool {
        self.state
            .read()
            .await
            .connections
            .get(conn_id)
            .is_some_and(|c| c.rooms.contains(&chat_id))
    }

    /// True iff the user has at least one registered connection.
    pub async fn is_online(&self, user_id: DbId) -> bool {
        self.state.read().await.users.contains_key(&user_id)
    }

    /// Return the current number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    /// Number of connections currently joined to a chat's room.
    pub async fn room_size(&self, chat_id: DbId) -> usize {
        self.state
            .read()
            .await
            .rooms
            .get(&chat_id)
            .map_or(0, HashSet::len)
    }

    /// Deliver an event to every connection in a chat's room, optionally
    /// excluding one connection (the emitter).
    ///
    /// The member set is snapshotted under the read lock; each connection's
    /// outbound channel is unbounded, so a slow or closed receiver never
    /// blocks delivery to the others. Returns the number of deliveries.
    pub async fn broadcast_to_room(
        &self,
        chat_id: DbId,
        event: &ServerEvent,
        exclude: Option<&str>,
    ) -> usize {
        let Some(msg) = encode(event) else { return 0 };
        let state = self.state.read().await;
        let Some(room) = state.rooms.get(&chat_id) else {
            return 0;
        };

        let mut count = 0;
        for conn_id in room {
            if exclude == Some(conn_id.as_str()) {
                continue;
            }
            if let Some(conn) = state.connections.get(conn_id) {
                let _ = conn.sender.send(msg.clone());
                count += 1;
            }
        }
        count
    }

    /// Deliver an event to every connection except those of `user_id`.
    ///
    /// Used for presence transitions, which go to all *other* users.
    pub async fn broadcast_except_user(&self, user_id: DbId, event: &ServerEvent) -> usize {
        let Some(msg) = encode(event) else { return 0 };
        let state = self.state.read().await;
        let mut count = 0;
        for conn in state.connections.values() {
            if conn.user_id != user_id {
                let _ = conn.sender.send(msg.clone());
                count += 1;
            }
        }
        count
    }

    /// Deliver an event to all of a user's connections.
    ///
    /// Returns the number of connections the event was sent to.
    pub async fn send_to_user(&self, user_id: DbId, event: &ServerEvent) -> usize {
        let Some(msg) = encode(event) else { return 0 };
        let state = self.state.read().await;
        let mut count = 0;
        if let Some(conn_ids) = state.users.get(&user_id) {
            for conn_id in conn_ids {
                if let Some(conn) = state.connections.get(conn_id) {
                    let _ = conn.sender.send(msg.clone());
                    count += 1;
                }
            }
        }
        count
    }

    /// Send a Ping frame to every connected client.
    ///
    /// Used by the heartbeat task to keep connections alive and detect
    /// stale ones.
    pub async fn ping_all(&self) {
        let state = self.state.read().await;
        for conn in state.connections.values() {
            let _ = conn.sender.send(Message::Ping(axum::body::Bytes::new()));
        }
    }

    /// Send a Close frame to every connection, then clear all state.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut state = self.state.write().await;
        let count = state.connections.len();
        for conn in state.connections.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        state.connections.clear();
        state.users.clear();
        state.rooms.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }
}

impl Default for ChatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize an event into a text frame. Serialization of these types
/// cannot fail in practice; a failure is logged and the event dropped.
fn encode(event: &ServerEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize server event");
            None
        }
    }
}
