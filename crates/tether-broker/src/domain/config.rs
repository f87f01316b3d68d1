//! Broker configuration.
//!
//! [`BrokerConfig`] is the single source of truth for runtime settings.  The
//! infrastructure layer populates it from CLI arguments or environment
//! variables; tests construct it directly.  Keeping it a plain struct (no
//! global state, no environment reads in here) keeps the broker easy to
//! embed in tests.

use std::net::SocketAddr;

/// All runtime configuration for the broker.
///
/// Devices and controllers register on two independent listening endpoints.
/// The defaults match the historical deployment: devices on 8900,
/// controllers on 8800, bound on all interfaces.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Address the device-facing WebSocket listener binds to.
    pub device_bind_addr: SocketAddr,

    /// Address the controller-facing WebSocket listener binds to.
    pub controller_bind_addr: SocketAddr,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            // Compile-time-known valid socket address strings.
            device_bind_addr: "0.0.0.0:8900".parse().unwrap(),
            controller_bind_addr: "0.0.0.0:8800".parse().unwrap(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_device_port_is_8900() {
        assert_eq!(BrokerConfig::default().device_bind_addr.port(), 8900);
    }

    #[test]
    fn test_default_controller_port_is_8800() {
        assert_eq!(BrokerConfig::default().controller_bind_addr.port(), 8800);
    }

    #[test]
    fn test_config_can_be_cloned() {
        let cfg = BrokerConfig::default();
        let cloned = cfg.clone();
        assert_eq!(cfg.device_bind_addr, cloned.device_bind_addr);
        assert_eq!(cfg.controller_bind_addr, cloned.controller_bind_addr);
    }
}
