use std::sync::Arc;

use crate::config::ServerConfig;
use crate::ws::ChatRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: relay_db::DbPool,
    /// Server configuration (JWT secret, bind address, CORS).
    pub config: Arc<ServerConfig>,
    /// Connection registry: presence, rooms, and live fan-out.
    pub registry: Arc<ChatRegistry>,
}
