//! Chat (conversation) entity model.

use relay_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use crate::models::user::UserSummary;

/// Chat row from the `chats` table. Membership lives in `chat_members`.
///
/// Direct chats (`is_group = false`) have exactly two members and no name or
/// admin; at most one direct chat exists per unordered member pair. Group
/// chats carry a display name and an admin. Chats are never deleted.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Chat {
    pub id: DbId,
    pub is_group: bool,
    pub group_name: Option<String>,
    pub admin_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Chat with member summaries populated, as returned by the listing API.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub id: DbId,
    pub is_group: bool,
    pub group_name: Option<String>,
    pub admin: Option<UserSummary>,
    pub members: Vec<UserSummary>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
