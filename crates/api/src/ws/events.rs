//! Wire protocol for the live channel.
//!
//! Both directions use JSON text frames, internally tagged on `"type"`:
//! commands are what clients send, events are what the server pushes.
//! The authenticated user identity always comes from the connection itself,
//! never from a command payload.

use relay_core::types::{DbId, Timestamp};
use relay_db::models::message::{MessageResponse, NewAttachment};
use serde::{Deserialize, Serialize};

/// Commands accepted from a live connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Join the room for a chat. Validated against stored membership;
    /// denied joins are a silent no-op.
    JoinChat { chat_id: DbId },

    /// Send a message into a chat.
    SendMessage {
        chat_id: DbId,
        content: String,
        #[serde(default)]
        attachments: Vec<NewAttachment>,
    },

    /// Ephemeral typing indicator; relayed, never persisted.
    Typing { chat_id: DbId },

    /// Explicit end-of-typing signal.
    StopTyping { chat_id: DbId },

    /// Mark the listed messages as read by the connection's user.
    MessageRead {
        chat_id: DbId,
        message_ids: Vec<DbId>,
    },

    /// Delete one of the user's own messages.
    DeleteMessage { chat_id: DbId, message_id: DbId },
}

/// Events pushed to live connections.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A user gained their first live connection.
    UserOnline { user_id: DbId },

    /// A user's last live connection went away.
    UserOffline {
        user_id: DbId,
        last_seen: Timestamp,
    },

    /// A newly persisted message, fanned out to the chat's room.
    ReceiveMessage { message: MessageResponse },

    Typing {
        chat_id: DbId,
        user_id: DbId,
        username: String,
    },

    StopTyping { chat_id: DbId, user_id: DbId },

    /// Read receipt: `user_id` has now seen `message_ids` in `chat_id`.
    MessageRead {
        chat_id: DbId,
        message_ids: Vec<DbId>,
        user_id: DbId,
    },

    MessageDeleted { chat_id: DbId, message_id: DbId },
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn join_chat_parses_from_wire_form() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type": "join_chat", "chat_id": 7}"#).unwrap();
        assert_matches!(cmd, ClientCommand::JoinChat { chat_id: 7 });
    }

    #[test]
    fn send_message_defaults_to_no_attachments() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type": "send_message", "chat_id": 3, "content": "hi"}"#)
                .unwrap();
        match cmd {
            ClientCommand::SendMessage {
                chat_id,
                content,
                attachments,
            } => {
                assert_eq!(chat_id, 3);
                assert_eq!(content, "hi");
                assert!(attachments.is_empty());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn send_message_parses_attachments() {
        let cmd: ClientCommand = serde_json::from_str(
            r#"{
                "type": "send_message",
                "chat_id": 3,
                "content": "",
                "attachments": [{"url": "https://cdn.example/a.png", "kind": "image"}]
            }"#,
        )
        .unwrap();
        match cmd {
            ClientCommand::SendMessage { attachments, .. } => {
                assert_eq!(attachments.len(), 1);
                assert_eq!(attachments[0].kind, "image");
                assert!(attachments[0].filename.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn message_read_parses_id_list() {
        let cmd: ClientCommand = serde_json::from_str(
            r#"{"type": "message_read", "chat_id": 1, "message_ids": [10, 11]}"#,
        )
        .unwrap();
        assert_matches!(
            cmd,
            ClientCommand::MessageRead { chat_id: 1, ref message_ids } if *message_ids == vec![10, 11]
        );
    }

    #[test]
    fn unknown_command_type_is_rejected() {
        let result: Result<ClientCommand, _> =
            serde_json::from_str(r#"{"type": "shutdown_server"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn server_events_serialize_with_snake_case_tags() {
        let online = serde_json::to_value(ServerEvent::UserOnline { user_id: 9 }).unwrap();
        assert_eq!(online["type"], "user_online");
        assert_eq!(online["user_id"], 9);

        let deleted = serde_json::to_value(ServerEvent::MessageDeleted {
            chat_id: 2,
            message_id: 41,
        })
        .unwrap();
        assert_eq!(deleted["type"], "message_deleted");
        assert_eq!(deleted["message_id"], 41);
    }
}
