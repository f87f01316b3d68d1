//! Infrastructure layer: WebSocket listeners and per-connection relay loops.

pub mod ws_server;

pub use ws_server::{accept_loop, run_broker, Role};
