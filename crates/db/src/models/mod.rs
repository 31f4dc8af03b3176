//! Entity models and DTOs for the conversation store.

pub mod chat;
pub mod message;
pub mod user;
