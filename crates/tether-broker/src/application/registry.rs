//! Device records and the single-writer registry.
//!
//! The registry is the broker's only shared mutable state.  It maps each
//! device identity to its live connection, its current controller, and the
//! FIFO queue of controllers waiting for control.  Alongside the records it
//! maintains a back-reference index from connection identity to owning
//! device, kept in step with every mutation, so disconnect reconciliation is
//! O(1) instead of a scan over all devices.
//!
//! # Invariants
//!
//! - A connection is `controller` of at most one record and never
//!   simultaneously in that record's queue.
//! - The queue preserves arrival order and holds no duplicates.
//! - A record with no connection, no controller, and an empty queue does not
//!   exist; it is removed by the mutation that emptied it.
//!
//! All mutations go through `&mut self` methods here; the [`super::Broker`]
//! serializes access behind one mutex so no two mutations of the same
//! record can interleave even though connection I/O is concurrent.

use std::collections::{HashMap, VecDeque};

use tether_core::DeviceId;

use crate::application::handle::{ConnId, PeerHandle};

// ── Device records ────────────────────────────────────────────────────────────

/// Everything the broker tracks about one device identity.
#[derive(Debug, Clone, Default)]
pub struct DeviceRecord {
    /// The device's current connection, or `None` while the device is
    /// offline but controllers are still attached.
    pub connection: Option<PeerHandle>,
    /// The controller currently granted exclusive control, if any.
    pub controller: Option<PeerHandle>,
    /// Controllers waiting for control; front is next to be promoted.
    pub queue: VecDeque<PeerHandle>,
}

impl DeviceRecord {
    /// True when all three fields are empty — the state in which the record
    /// must not continue to exist.
    fn is_vacant(&self) -> bool {
        self.connection.is_none() && self.controller.is_none() && self.queue.is_empty()
    }

    /// All attached controllers, current controller first, then the queue in
    /// promotion order.
    pub fn members(&self) -> Vec<PeerHandle> {
        self.controller
            .iter()
            .chain(self.queue.iter())
            .cloned()
            .collect()
    }
}

// ── Mutation outcomes ─────────────────────────────────────────────────────────

/// What a [`Registry::grant`] did with the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// The controller slot was free; the connection now holds control.
    Control,
    /// Another controller holds control; the connection is (or already was)
    /// in the queue.
    Queued,
}

/// Result of a device connection going away.
#[derive(Debug)]
pub enum DeviceDisconnect {
    /// No controllers were attached; the record was deleted.
    Deleted,
    /// Controllers remain attached and should be told the device is offline.
    Suspended(Vec<PeerHandle>),
}

/// Result of a controller connection going away.
#[derive(Debug)]
pub enum ControllerRemoval {
    /// The departed connection held control; the queue front was promoted
    /// into the controller slot and should be notified.
    Promoted(PeerHandle),
    /// The departed connection held control; the queue was empty, the
    /// device remains registered with no controller.
    Released,
    /// The departed connection held control, the queue was empty, and the
    /// device was offline; the record was deleted.
    Deleted,
    /// The departed connection was only waiting in the queue.
    Dequeued,
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// In-memory table of device-to-controller associations.
#[derive(Debug, Default)]
pub struct Registry {
    devices: HashMap<DeviceId, DeviceRecord>,
    /// Connection → owning device identity, for every connection currently
    /// referenced by any record (device connection, controller, or queue
    /// member).  Updated atomically with every record mutation.
    owners: HashMap<ConnId, DeviceId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn lookup(&self, id: &str) -> Option<&DeviceRecord> {
        self.devices.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    /// True when zero device records exist (the "no device available"
    /// condition for controller registration).
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Iterates all records; iteration order is unspecified but stable
    /// within one call.
    pub fn iter(&self) -> impl Iterator<Item = (&DeviceId, &DeviceRecord)> {
        self.devices.iter()
    }

    /// The device identity a connection is currently attached to, if any.
    pub fn owner_of(&self, conn: ConnId) -> Option<&DeviceId> {
        self.owners.get(&conn)
    }

    /// All controllers attached to a device, current controller first.
    pub fn controllers_of(&self, id: &str) -> Vec<PeerHandle> {
        self.devices.get(id).map(DeviceRecord::members).unwrap_or_default()
    }

    // ── Mutations ────────────────────────────────────────────────────────────

    /// Registers (or re-registers) a device connection under `id`, creating
    /// the record on first sight or reusing it when the identity survives
    /// from a prior session with attached controllers.
    ///
    /// Returns the superseded connection when the identity was still bound
    /// to a live connection; the caller decides how to dispose of it.
    pub fn register_device(&mut self, id: &str, handle: PeerHandle) -> Option<PeerHandle> {
        let record = self.devices.entry(id.to_string()).or_default();
        let superseded = record.connection.replace(handle.clone());
        if let Some(old) = &superseded {
            self.owners.remove(&old.id());
        }
        self.owners.insert(handle.id(), id.to_string());
        superseded
    }

    /// Grants control of `id` to `handle` or queues it.
    ///
    /// When the controller slot is free the connection takes it (leaving the
    /// queue first if it was waiting there).  Otherwise the connection joins
    /// the back of the queue; if it is already queued its position is kept.
    ///
    /// Returns `None` when no record exists for `id` — the protocol checks
    /// existence under the same lock, so that is a defect at the call site.
    pub fn grant(&mut self, id: &str, handle: PeerHandle) -> Option<GrantOutcome> {
        let record = self.devices.get_mut(id)?;
        self.owners.insert(handle.id(), id.to_string());

        match &record.controller {
            None => {
                record.queue.retain(|h| h.id() != handle.id());
                record.controller = Some(handle);
                Some(GrantOutcome::Control)
            }
            Some(current) if current.id() == handle.id() => {
                // Re-granting the sitting controller is a no-op.
                Some(GrantOutcome::Control)
            }
            Some(_) => {
                if !record.queue.iter().any(|h| h.id() == handle.id()) {
                    record.queue.push_back(handle);
                }
                Some(GrantOutcome::Queued)
            }
        }
    }

    /// Clears a device's connection after its transport closed.
    ///
    /// The record is deleted when no controllers remain attached; otherwise
    /// the attached controllers are returned so the protocol can downgrade
    /// them to `Pending`.
    pub fn disconnect_device(&mut self, id: &str) -> Option<DeviceDisconnect> {
        let record = self.devices.get_mut(id)?;
        if let Some(conn) = record.connection.take() {
            self.owners.remove(&conn.id());
        }
        let members = record.members();
        if self.remove_if_empty(id) {
            Some(DeviceDisconnect::Deleted)
        } else {
            Some(DeviceDisconnect::Suspended(members))
        }
    }

    /// Removes a departed controller connection from a device record.
    ///
    /// Exactly one branch applies: either the connection held control (clear
    /// the slot and promote the queue front, or delete the record when the
    /// device is also gone), or it was waiting in the queue (drop it).
    pub fn remove_controller(&mut self, id: &str, conn: ConnId) -> Option<ControllerRemoval> {
        let record = self.devices.get_mut(id)?;
        self.owners.remove(&conn);

        let held_control = record.controller.as_ref().is_some_and(|c| c.id() == conn);
        let outcome = if held_control {
            record.controller = None;
            if let Some(next) = record.queue.pop_front() {
                record.controller = Some(next.clone());
                ControllerRemoval::Promoted(next)
            } else if record.connection.is_none() {
                ControllerRemoval::Deleted
            } else {
                ControllerRemoval::Released
            }
        } else {
            record.queue.retain(|h| h.id() != conn);
            ControllerRemoval::Dequeued
        };
        self.remove_if_empty(id);
        Some(outcome)
    }

    /// Deletes the record for `id` when all three fields are empty.
    ///
    /// Returns `true` when the record was removed.  Every mutation that can
    /// empty a record ends by calling this, which is what upholds the
    /// no-orphan-records invariant.
    pub fn remove_if_empty(&mut self, id: &str) -> bool {
        if self.devices.get(id).is_some_and(DeviceRecord::is_vacant) {
            self.devices.remove(id);
            true
        } else {
            false
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
