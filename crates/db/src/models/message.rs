//! Message entity model, attachments, and the wire-facing response shape.

use relay_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::user::UserSummary;

/// Message kind, inferred from attachments at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
    File,
}

impl MessageType {
    /// Stored representation in the `messages.message_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Video => "video",
            MessageType::Audio => "audio",
            MessageType::File => "file",
        }
    }

    /// Infer the message type from its attachments: `text` when there are
    /// none, otherwise the first attachment's declared kind (unknown kinds
    /// fall back to `file`).
    pub fn infer(attachments: &[NewAttachment]) -> Self {
        match attachments.first() {
            None => MessageType::Text,
            Some(att) => match att.kind.as_str() {
                "image" => MessageType::Image,
                "video" => MessageType::Video,
                "audio" => MessageType::Audio,
                _ => MessageType::File,
            },
        }
    }
}

/// Message row from the `messages` table.
#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: DbId,
    pub chat_id: DbId,
    pub sender_id: DbId,
    pub content: String,
    pub message_type: String,
    pub created_at: Timestamp,
}

/// Stored attachment row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MessageAttachment {
    pub id: DbId,
    pub message_id: DbId,
    pub url: String,
    pub kind: String,
    pub filename: Option<String>,
    pub size_bytes: Option<i64>,
}

/// Attachment as supplied by a client alongside a send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAttachment {
    pub url: String,
    pub kind: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<i64>,
}

/// Input for persisting a new message.
#[derive(Debug, Clone)]
pub struct CreateMessage {
    pub chat_id: DbId,
    pub sender_id: DbId,
    pub content: String,
    pub attachments: Vec<NewAttachment>,
}

/// Fully populated message as delivered over REST and the live channel.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub id: DbId,
    pub chat_id: DbId,
    pub sender: UserSummary,
    pub content: String,
    pub message_type: String,
    pub attachments: Vec<MessageAttachment>,
    /// User ids that have seen this message; always contains the sender.
    pub read_by: Vec<DbId>,
    pub created_at: Timestamp,
}
