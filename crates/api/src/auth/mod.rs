//! Access-token validation for REST requests and WebSocket handshakes.

pub mod jwt;
