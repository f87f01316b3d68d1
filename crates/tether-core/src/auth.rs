//! Pluggable credential check invoked during registration.
//!
//! Both registration protocols hand the full parsed initial message to a
//! [`CredentialCheck`] before touching the registry, so deployments can
//! require a shared secret (e.g. a `"password"` field alongside the device
//! identity) without changing the broker.
//!
//! The shipped implementation is [`AllowAll`]: verification is currently
//! bypassed, pending integration with the deployment's secret store.

use serde_json::Value;

/// Decides whether an initial registration message is allowed to proceed.
///
/// A `false` return maps to `Rejected: Permission denied` and the connection
/// is closed without any registry mutation.
pub trait CredentialCheck: Send + Sync {
    fn verify(&self, initial: &Value) -> bool;
}

/// Accepts every registration unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl CredentialCheck for AllowAll {
    fn verify(&self, _initial: &Value) -> bool {
        true
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all_accepts_anything() {
        let check = AllowAll;
        assert!(check.verify(&serde_json::json!({"id": "robot-7"})));
        assert!(check.verify(&serde_json::json!(null)));
    }
}
