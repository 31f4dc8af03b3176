//! Health check endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

/// Routes mounted at the server root.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// GET /health
///
/// Liveness plus a database round-trip; the connection count is included
/// for quick operational inspection.
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db_ok = relay_db::health_check(&state.pool).await.is_ok();
    let connections = state.registry.connection_count().await;

    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "database": db_ok,
        "connections": connections,
    }))
}
