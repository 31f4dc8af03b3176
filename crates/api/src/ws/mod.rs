//! Realtime messaging layer.
//!
//! Owns the WebSocket upgrade handler, the connection registry (presence and
//! chat rooms), the command dispatcher (fan-out, typing, read receipts,
//! deletion), and the heartbeat task.

pub mod dispatch;
pub mod events;
mod handler;
mod heartbeat;
pub mod registry;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use registry::ChatRegistry;
