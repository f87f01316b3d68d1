//! # tether-core
//!
//! Shared library for the Tether broker containing the wire message types
//! and the pluggable credential check.
//!
//! This crate is used by the broker binary and by any native client that
//! wants to speak the registration protocol.  It has zero dependencies on
//! sockets, async runtimes, or any particular transport.
//!
//! # Protocol overview
//!
//! Tether brokers exclusive, queued control of constrained remote devices
//! (robots, lab equipment) for remote controllers.  Both sides connect over
//! a persistent, message-oriented duplex channel and open with a single JSON
//! registration message:
//!
//! - A **device** announces its identity: `{"id": "robot-7"}`
//! - A **controller** optionally names a device: `{"preferred_device": "robot-7"}`
//!
//! The broker answers with plain-text status notifications
//! (`Control: robot-7`, `Queue: robot-7`, `Pending: robot-7`,
//! `Rejected: <reason>`).  Every message after registration is an opaque
//! payload relayed verbatim to the paired connection.

pub mod auth;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `tether_core::Status` instead of `tether_core::protocol::status::Status`.
pub use auth::{AllowAll, CredentialCheck};
pub use protocol::error::RegistrationError;
pub use protocol::messages::{ControllerHello, DeviceHello, DeviceId, Frame};
pub use protocol::status::Status;
