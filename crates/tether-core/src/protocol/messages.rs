//! Registration message types and the opaque relay frame.
//!
//! Each endpoint's first message is a JSON object; everything after it is an
//! opaque payload ([`Frame`]) that the broker relays verbatim without
//! inspecting or transforming.
//!
//! # Registration messages
//!
//! ```json
//! {"id": "robot-7"}                  // device → broker
//! {"preferred_device": "robot-7"}    // controller → broker (field optional)
//! {}                                 // controller with no preference
//! ```
//!
//! Parsing happens once, at registration entry.  Shape failures become
//! [`RegistrationError`] values rather than being spread through the broker
//! as ad-hoc `Option` handling.

use serde::Deserialize;
use serde_json::Value;

use crate::protocol::error::RegistrationError;

/// Opaque device identity, supplied by the device itself at registration.
///
/// The broker never generates identities; it only keys its registry by them.
pub type DeviceId = String;

// ── Relay frames ──────────────────────────────────────────────────────────────

/// One opaque payload relayed between a device and its controller.
///
/// The broker treats both shapes identically: resolve the paired connection,
/// forward verbatim, never buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    /// Payload length in bytes (UTF-8 length for text frames).
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(s) => s.len(),
            Frame::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Device registration ───────────────────────────────────────────────────────

/// Initial message sent by a device: `{"id": "<identity>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceHello {
    /// The device's self-declared identity.  Required and non-empty.
    pub id: DeviceId,
}

impl DeviceHello {
    /// Extracts a device hello from an already-parsed JSON value.
    ///
    /// The caller parses the raw text once (so the credential check can see
    /// the full object) and hands the value here for shape validation.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::MissingDeviceId`] when the `id` field is absent,
    /// not a string, or empty; [`RegistrationError::MalformedInitial`] when
    /// the value is not an object at all.
    pub fn from_value(value: &Value) -> Result<Self, RegistrationError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RegistrationError::MalformedInitial("expected a JSON object".into()))?;
        let id = obj
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(RegistrationError::MissingDeviceId)?;
        Ok(Self { id: id.to_string() })
    }
}

// ── Controller registration ───────────────────────────────────────────────────

/// Initial message sent by a controller: `{"preferred_device": "<identity>"}`.
///
/// The preference is optional; `{}` asks the broker to pick a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ControllerHello {
    #[serde(default)]
    pub preferred_device: Option<DeviceId>,
}

impl ControllerHello {
    /// Extracts a controller hello from an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::MalformedInitial`] when the value is not an
    /// object or `preferred_device` is present but not a string.
    pub fn from_value(value: &Value) -> Result<Self, RegistrationError> {
        serde_json::from_value(value.clone())
            .map_err(|e| RegistrationError::MalformedInitial(e.to_string()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn json(raw: &str) -> Value {
        serde_json::from_str(raw).expect("test input must be valid JSON")
    }

    #[test]
    fn test_device_hello_parses_identity() {
        let hello = DeviceHello::from_value(&json(r#"{"id": "robot-7"}"#)).unwrap();
        assert_eq!(hello.id, "robot-7");
    }

    #[test]
    fn test_device_hello_ignores_extra_fields() {
        // Clients may send auth material alongside the identity; the shape
        // check must not reject it.
        let hello =
            DeviceHello::from_value(&json(r#"{"id": "robot-7", "password": "hunter2"}"#)).unwrap();
        assert_eq!(hello.id, "robot-7");
    }

    #[test]
    fn test_device_hello_missing_id_is_rejected() {
        let err = DeviceHello::from_value(&json(r#"{"name": "robot-7"}"#)).unwrap_err();
        assert_eq!(err, RegistrationError::MissingDeviceId);
    }

    #[test]
    fn test_device_hello_empty_id_is_rejected() {
        let err = DeviceHello::from_value(&json(r#"{"id": ""}"#)).unwrap_err();
        assert_eq!(err, RegistrationError::MissingDeviceId);
    }

    #[test]
    fn test_device_hello_non_string_id_is_rejected() {
        let err = DeviceHello::from_value(&json(r#"{"id": 7}"#)).unwrap_err();
        assert_eq!(err, RegistrationError::MissingDeviceId);
    }

    #[test]
    fn test_device_hello_non_object_is_malformed() {
        let err = DeviceHello::from_value(&json(r#"["robot-7"]"#)).unwrap_err();
        assert!(matches!(err, RegistrationError::MalformedInitial(_)));
    }

    #[test]
    fn test_controller_hello_with_preference() {
        let hello =
            ControllerHello::from_value(&json(r#"{"preferred_device": "robot-7"}"#)).unwrap();
        assert_eq!(hello.preferred_device.as_deref(), Some("robot-7"));
    }

    #[test]
    fn test_controller_hello_empty_object_means_no_preference() {
        let hello = ControllerHello::from_value(&json("{}")).unwrap();
        assert_eq!(hello.preferred_device, None);
    }

    #[test]
    fn test_controller_hello_non_string_preference_is_malformed() {
        let err = ControllerHello::from_value(&json(r#"{"preferred_device": 7}"#)).unwrap_err();
        assert!(matches!(err, RegistrationError::MalformedInitial(_)));
    }

    #[test]
    fn test_frame_len_counts_payload_bytes() {
        assert_eq!(Frame::Text("beep".to_string()).len(), 4);
        assert_eq!(Frame::Binary(vec![0x01, 0x02]).len(), 2);
        assert!(Frame::Text(String::new()).is_empty());
    }
}
