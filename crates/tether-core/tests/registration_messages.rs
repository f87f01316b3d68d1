//! Integration tests for the public registration-message surface.
//!
//! These exercise `tether-core` the way the broker consumes it: parse the
//! raw initial text once into JSON, run the credential check, then extract
//! the typed hello and map failures to rejection texts.

use serde_json::Value;
use tether_core::{AllowAll, ControllerHello, CredentialCheck, DeviceHello, RegistrationError};

fn initial(raw: &str) -> Result<Value, RegistrationError> {
    serde_json::from_str(raw).map_err(|e| RegistrationError::MalformedInitial(e.to_string()))
}

#[test]
fn device_registration_happy_path() {
    let value = initial(r#"{"id": "rover-lab-3"}"#).unwrap();
    assert!(AllowAll.verify(&value));
    let hello = DeviceHello::from_value(&value).unwrap();
    assert_eq!(hello.id, "rover-lab-3");
}

#[test]
fn controller_registration_happy_path_without_preference() {
    let value = initial("{}").unwrap();
    let hello = ControllerHello::from_value(&value).unwrap();
    assert_eq!(hello.preferred_device, None);
}

#[test]
fn unparseable_initial_text_maps_to_the_invalid_registration_rejection() {
    let err = initial("BEEP BOOP").unwrap_err();
    assert_eq!(
        err.rejection().to_string(),
        "Rejected: Invalid registration message"
    );
}

#[test]
fn extra_credential_fields_survive_to_the_credential_check() {
    // A deployment-specific check can look at fields the typed hello
    // ignores.
    struct WantsToken;
    impl CredentialCheck for WantsToken {
        fn verify(&self, initial: &Value) -> bool {
            initial.get("token").is_some()
        }
    }

    let value = initial(r#"{"id": "rover-lab-3", "token": "abc"}"#).unwrap();
    assert!(WantsToken.verify(&value));
    assert_eq!(DeviceHello::from_value(&value).unwrap().id, "rover-lab-3");
}
