//! tether-broker library crate.
//!
//! This crate implements the broker that grants exclusive, queued control of
//! constrained remote devices to remote controllers over persistent
//! WebSocket connections.
//!
//! # Architecture
//!
//! ```text
//! Devices (ws, port 8900)      Controllers (ws, port 8800)
//!         ↕                            ↕
//! [tether-broker]
//!   ├── domain/           BrokerConfig
//!   ├── application/      Registry, selection policy, control protocol
//!   └── infrastructure/   WebSocket listeners, per-connection relay loops
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` owns all broker state; it knows nothing about WebSockets.
//!   Connections appear to it only as [`application::handle::PeerHandle`]s.
//! - `infrastructure` depends on everything else plus `tokio` and
//!   `tungstenite`.
//!
//! The split keeps the control/hand-off state machine testable with plain
//! channel-backed handles, with no sockets in sight.

pub mod application;
pub mod domain;
pub mod infrastructure;
