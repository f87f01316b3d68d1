//! Control protocol: registration, grant/queue, promotion, payload
//! forwarding, and disconnect reconciliation.
//!
//! The [`Broker`] owns the [`Registry`] behind a single `tokio::sync::Mutex`.
//! Every control decision (grant, promote, select) reads and writes the
//! registry under one lock acquisition, so no other flow can mutate between
//! the read and the write.  Sends to peers are non-blocking enqueues (see
//! [`PeerHandle`]), so the lock is never held across transport I/O.
//!
//! # State machines
//!
//! ```text
//! device:      CONNECTING → REGISTERED → (RELAYING | IDLE) → DISCONNECTED
//! controller:  CONNECTING → (REJECTED | QUEUED | CONTROLLING) → DISBANDED
//! ```
//!
//! The infrastructure layer drives these transitions: it calls
//! [`Broker::register_device`] / [`Broker::register_controller`] with each
//! connection's first message, the `forward_from_*` methods for every
//! subsequent payload, and [`Broker::disband`] exactly once when the
//! transport closes.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use tether_core::{
    ControllerHello, CredentialCheck, DeviceHello, DeviceId, Frame, RegistrationError, Status,
};

use crate::application::handle::{ConnId, PeerHandle};
use crate::application::registry::{
    ControllerRemoval, DeviceDisconnect, GrantOutcome, Registry,
};
use crate::application::selection::choose_device;

/// The connection broker.
///
/// Cheap to share: wrap in an `Arc` and clone across connection tasks.
pub struct Broker {
    registry: Mutex<Registry>,
    auth: Arc<dyn CredentialCheck>,
}

impl Broker {
    pub fn new(auth: Arc<dyn CredentialCheck>) -> Self {
        Self {
            registry: Mutex::new(Registry::new()),
            auth,
        }
    }

    // ── Registration ─────────────────────────────────────────────────────────

    /// Registers a device connection from its initial message.
    ///
    /// Creates or reuses the device record, then re-notifies every attached
    /// controller of its current status — this is what re-synchronizes
    /// controllers across a device reconnect.  A still-live previous
    /// connection for the same identity is superseded and closed.
    ///
    /// # Errors
    ///
    /// Registration errors are fatal to this connection only; the registry
    /// is not mutated on any error path.
    pub async fn register_device(
        &self,
        raw: &str,
        handle: PeerHandle,
    ) -> Result<DeviceId, RegistrationError> {
        let hello = DeviceHello::from_value(&self.verified_initial(raw)?)?;
        let id = hello.id;

        let mut registry = self.registry.lock().await;
        if let Some(superseded) = registry.register_device(&id, handle) {
            info!(device = %id, "superseding still-connected device registration");
            superseded.close();
        }

        let (controller, queue) = match registry.lookup(&id) {
            Some(record) => (record.controller.clone(), record.queue.clone()),
            None => (None, Default::default()),
        };
        let attached = usize::from(controller.is_some()) + queue.len();
        if let Some(member) = controller {
            if !member.send_status(Status::Control(id.clone())) {
                // Peer's writer is gone; its own loop reconciles it.
                debug!(device = %id, "skipped status for departed controller");
            }
        }
        for member in queue {
            if !member.send_status(Status::Queue(id.clone())) {
                debug!(device = %id, "skipped status for departed controller");
            }
        }
        info!(device = %id, controllers = attached, "device registered");
        Ok(id)
    }

    /// Registers a controller connection from its initial message, granting
    /// control immediately or queueing it.
    ///
    /// The target device is the declared preference when present, otherwise
    /// the selection policy's pick.  The grant decision and the resulting
    /// `Control`/`Queue` notification happen under the registry lock.
    ///
    /// # Errors
    ///
    /// `NoDeviceAvailable` when zero devices are registered or the preferred
    /// identity is unknown; parse and credential failures as for devices.
    pub async fn register_controller(
        &self,
        raw: &str,
        handle: PeerHandle,
    ) -> Result<DeviceId, RegistrationError> {
        let hello = ControllerHello::from_value(&self.verified_initial(raw)?)?;

        let mut registry = self.registry.lock().await;
        if registry.is_empty() {
            return Err(RegistrationError::NoDeviceAvailable);
        }

        let target = match hello.preferred_device {
            Some(preferred) => {
                if !registry.contains(&preferred) {
                    return Err(RegistrationError::NoDeviceAvailable);
                }
                preferred
            }
            None => choose_device(&registry).ok_or(RegistrationError::NoDeviceAvailable)?,
        };

        let outcome = registry
            .grant(&target, handle.clone())
            .ok_or(RegistrationError::NoDeviceAvailable)?;
        let status = match outcome {
            GrantOutcome::Control => Status::Control(target.clone()),
            GrantOutcome::Queued => Status::Queue(target.clone()),
        };
        info!(device = %target, outcome = ?outcome, "controller registered");
        if !handle.send_status(status) {
            debug!(device = %target, "controller departed before status delivery");
        }
        Ok(target)
    }

    // ── Relay ────────────────────────────────────────────────────────────────

    /// Forwards a payload from a device to its current controller.
    ///
    /// The target is resolved freshly for every payload — control can change
    /// hands between messages.  With no controller attached the payload is
    /// dropped silently; nothing is buffered.
    pub async fn forward_from_device(&self, conn: ConnId, frame: Frame) {
        let registry = self.registry.lock().await;
        let Some(record) = registry.owner_of(conn).and_then(|id| registry.lookup(id)) else {
            return;
        };
        match &record.controller {
            Some(controller) => {
                if !controller.send_frame(frame) {
                    debug!("dropped device payload: controller transport gone");
                }
            }
            None => debug!("dropped device payload: no controller attached"),
        }
    }

    /// Forwards a payload from a controller to its device.
    ///
    /// Only the sitting controller's payloads reach the device; payloads
    /// from queued controllers, or while the device is offline, are dropped
    /// silently.
    pub async fn forward_from_controller(&self, conn: ConnId, frame: Frame) {
        let registry = self.registry.lock().await;
        let Some(record) = registry.owner_of(conn).and_then(|id| registry.lookup(id)) else {
            return;
        };
        let holds_control = record.controller.as_ref().is_some_and(|c| c.id() == conn);
        if !holds_control {
            debug!("dropped controller payload: sender is queued, not in control");
            return;
        }
        match &record.connection {
            Some(device) => {
                if !device.send_frame(frame) {
                    debug!("dropped controller payload: device transport gone");
                }
            }
            None => debug!("dropped controller payload: device offline"),
        }
    }

    // ── Disconnect reconciliation ────────────────────────────────────────────

    /// Restores registry invariants after a connection's transport closed.
    ///
    /// Called exactly once per connection from its own receive loop,
    /// whether the registration was for a device or a controller.  Unknown
    /// connections (rejected before registration, or already superseded)
    /// are a no-op.
    pub async fn disband(&self, conn: ConnId) {
        let mut registry = self.registry.lock().await;
        let Some(id) = registry.owner_of(conn).cloned() else {
            return;
        };

        let is_device = registry
            .lookup(&id)
            .and_then(|record| record.connection.as_ref())
            .is_some_and(|c| c.id() == conn);

        if is_device {
            match registry.disconnect_device(&id) {
                Some(DeviceDisconnect::Deleted) => {
                    info!(device = %id, "device disconnected, record removed");
                }
                Some(DeviceDisconnect::Suspended(members)) => {
                    info!(device = %id, waiting = members.len(), "device offline, controllers kept");
                    for member in members {
                        if !member.send_status(Status::Pending(id.clone())) {
                            debug!(device = %id, "skipped pending status for departed controller");
                        }
                    }
                }
                None => error!(device = %id, "owner index pointed at a missing record"),
            }
        } else {
            match registry.remove_controller(&id, conn) {
                Some(ControllerRemoval::Promoted(next)) => {
                    info!(device = %id, "controller disconnected, promoting queue front");
                    if !next.send_status(Status::Control(id.clone())) {
                        warn!(device = %id, "promoted controller already gone");
                    }
                }
                Some(ControllerRemoval::Released) => {
                    info!(device = %id, "controller disconnected, device now uncontrolled");
                }
                Some(ControllerRemoval::Deleted) => {
                    info!(device = %id, "last controller left offline device, record removed");
                }
                Some(ControllerRemoval::Dequeued) => {
                    debug!(device = %id, "queued controller left");
                }
                None => error!(device = %id, "owner index pointed at a missing record"),
            }
        }
    }

    // ── Internals ────────────────────────────────────────────────────────────

    /// Parses the raw initial message and runs it through the credential
    /// check.  Shared by both registration protocols.
    fn verified_initial(&self, raw: &str) -> Result<Value, RegistrationError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| RegistrationError::MalformedInitial(e.to_string()))?;
        if !self.auth.verify(&value) {
            return Err(RegistrationError::PermissionDenied);
        }
        Ok(value)
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(Arc::new(tether_core::AllowAll))
    }
}
