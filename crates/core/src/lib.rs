//! Shared domain types and the error taxonomy used across the workspace.

pub mod error;
pub mod types;
