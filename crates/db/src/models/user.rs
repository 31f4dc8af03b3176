//! User summary model.
//!
//! Account rows are owned by the external auth service; this service only
//! reads the compact shape it embeds in payloads, and writes the
//! `is_online` / `last_seen` presence cache. The in-process registry is the
//! live source of truth for presence.

use relay_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Compact user representation embedded in chat listings, message payloads,
/// and realtime events.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserSummary {
    pub id: DbId,
    pub username: String,
    pub avatar: String,
    pub is_online: bool,
    pub last_seen: Option<Timestamp>,
}
