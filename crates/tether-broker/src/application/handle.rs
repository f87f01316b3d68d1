//! Connection handle: the application layer's view of one transport
//! connection.
//!
//! The WebSocket plumbing lives in the infrastructure layer; up here a
//! connection is just a [`PeerHandle`] — an identity plus an unbounded
//! outbound queue.  Sending enqueues and returns immediately, so registry
//! mutations are never blocked on a slow peer's transport.  A dedicated
//! writer task per connection drains the queue into the real socket.
//!
//! A failed enqueue means the writer task is gone, i.e. the peer's transport
//! already failed.  That is not handled synchronously here: the peer's own
//! receive loop observes the failure and runs disconnect reconciliation for
//! it.

use tokio::sync::mpsc;
use uuid::Uuid;

use tether_core::{Frame, Status};

/// Identity of one accepted connection, assigned by the broker at accept
/// time.  Used for value-equality in the registry and as the key of the
/// connection → device back-reference index.
pub type ConnId = Uuid;

/// One item on a connection's outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Opaque payload relayed from the paired connection.
    Frame(Frame),
    /// Broker-originated status notification.
    Status(Status),
    /// Instructs the writer task to close the transport.
    Close,
}

/// Cheap, cloneable handle to one connection's outbound side.
///
/// Equality is by [`ConnId`]; the registry never compares channel ends.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: ConnId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl PeerHandle {
    /// Creates a handle with a fresh connection identity.
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Enqueues an opaque payload for this peer.
    ///
    /// Returns `false` when the peer's writer task has already ended; the
    /// caller drops the payload and moves on.
    pub fn send_frame(&self, frame: Frame) -> bool {
        self.tx.send(Outbound::Frame(frame)).is_ok()
    }

    /// Enqueues a status notification for this peer.
    pub fn send_status(&self, status: Status) -> bool {
        self.tx.send(Outbound::Status(status)).is_ok()
    }

    /// Asks the writer task to close the transport.  Best-effort: if the
    /// writer is already gone the transport is already closed.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }
}

impl PartialEq for PeerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PeerHandle {}

// ── Tests ─────────────────────────────────────────────────────────────────────
