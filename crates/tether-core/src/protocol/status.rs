//! Broker → client status notifications.
//!
//! Wire format is colon-delimited plain text so constrained device firmware
//! can match on the prefix without a JSON parser:
//!
//! ```text
//! Rejected: No device available
//! Control: robot-7
//! Queue: robot-7
//! Pending: robot-7
//! ```

use std::fmt;

use crate::protocol::messages::DeviceId;

/// A status notification sent to a controller (or, for `Rejected`, to either
/// side) over its own connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Registration failed; the connection is closed after this message.
    Rejected(String),
    /// This controller now holds exclusive control of the named device.
    Control(DeviceId),
    /// This controller is waiting in the named device's queue.
    Queue(DeviceId),
    /// The named device is currently offline; control/queue membership is
    /// preserved and will be re-announced when the device returns.
    Pending(DeviceId),
}

impl Status {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Status::Rejected(reason.into())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Rejected(reason) => write!(f, "Rejected: {reason}"),
            Status::Control(id) => write!(f, "Control: {id}"),
            Status::Queue(id) => write!(f, "Queue: {id}"),
            Status::Pending(id) => write!(f, "Pending: {id}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_wire_text() {
        assert_eq!(Status::Control("robot-7".into()).to_string(), "Control: robot-7");
    }

    #[test]
    fn test_queue_wire_text() {
        assert_eq!(Status::Queue("robot-7".into()).to_string(), "Queue: robot-7");
    }

    #[test]
    fn test_pending_wire_text() {
        assert_eq!(Status::Pending("robot-7".into()).to_string(), "Pending: robot-7");
    }

    #[test]
    fn test_rejected_wire_text() {
        assert_eq!(
            Status::rejected("No device available").to_string(),
            "Rejected: No device available"
        );
    }
}
