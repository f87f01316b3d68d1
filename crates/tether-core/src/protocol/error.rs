//! Registration error taxonomy.
//!
//! Every error here is fatal to the registering connection only: the broker
//! sends a `Rejected: <reason>` status, closes the connection, and leaves
//! the registry untouched.  Nothing in this taxonomy is ever surfaced as a
//! process-level failure.

use thiserror::Error;

use crate::protocol::status::Status;

/// Reasons a registration attempt can be refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// The initial message was not parseable as the expected JSON shape.
    #[error("malformed initial message: {0}")]
    MalformedInitial(String),

    /// A device's initial message lacked a usable `id` field.
    #[error("initial message is missing the device identity")]
    MissingDeviceId,

    /// A controller registered while zero devices were known to the broker,
    /// or its preferred device identity is not registered.
    #[error("no device available")]
    NoDeviceAvailable,

    /// The pluggable credential check refused the initial message.
    #[error("permission denied")]
    PermissionDenied,
}

impl RegistrationError {
    /// The `Rejected` status notification carrying this error's reason text.
    pub fn rejection(&self) -> Status {
        let reason = match self {
            RegistrationError::MalformedInitial(_) | RegistrationError::MissingDeviceId => {
                "Invalid registration message"
            }
            RegistrationError::NoDeviceAvailable => "No device available",
            RegistrationError::PermissionDenied => "Permission denied",
        };
        Status::rejected(reason)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_device_rejection_text() {
        assert_eq!(
            RegistrationError::NoDeviceAvailable.rejection().to_string(),
            "Rejected: No device available"
        );
    }

    #[test]
    fn test_permission_rejection_text() {
        assert_eq!(
            RegistrationError::PermissionDenied.rejection().to_string(),
            "Rejected: Permission denied"
        );
    }

    #[test]
    fn test_malformed_and_missing_id_share_reason_text() {
        let malformed = RegistrationError::MalformedInitial("bad".into()).rejection();
        let missing = RegistrationError::MissingDeviceId.rejection();
        assert_eq!(malformed, missing);
        assert_eq!(malformed.to_string(), "Rejected: Invalid registration message");
    }
}
