//! Application layer: the broker's state machine.
//!
//! - [`handle`] — the connection handle abstraction the rest of the layer
//!   works against.
//! - [`registry`] — device records and the single-writer registry.
//! - [`selection`] — which device an unpreferenced controller joins.
//! - [`broker`] — the control protocol: registration, grant/queue,
//!   promotion, disconnect reconciliation, and payload forwarding.

pub mod broker;
pub mod handle;
pub mod registry;
pub mod selection;

pub use broker::Broker;
pub use handle::{ConnId, Outbound, PeerHandle};
pub use registry::{DeviceRecord, Registry};
