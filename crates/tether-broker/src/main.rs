//! Tether broker — entry point.
//!
//! This binary accepts WebSocket connections on two endpoints — one for
//! devices, one for controllers — and brokers exclusive, queued control:
//! each device is driven by at most one controller at a time, later
//! controllers wait in a FIFO queue, and the queue front is promoted
//! automatically when the controlling connection drops.
//!
//! # Usage
//!
//! ```text
//! tether-broker [OPTIONS]
//!
//! Options:
//!   --bind            <ADDR>  Bind address for both endpoints [default: 0.0.0.0]
//!   --device-port     <PORT>  Device endpoint port            [default: 8900]
//!   --controller-port <PORT>  Controller endpoint port        [default: 8800]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                 | Default   | Description              |
//! |--------------------------|-----------|--------------------------|
//! | `TETHER_BIND`            | `0.0.0.0` | Bind address             |
//! | `TETHER_DEVICE_PORT`     | `8900`    | Device endpoint port     |
//! | `TETHER_CONTROLLER_PORT` | `8800`    | Controller endpoint port |
//!
//! CLI arguments take precedence when both are present.  The log level is
//! controlled by `RUST_LOG` (default `info`).

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tether_broker::application::Broker;
use tether_broker::domain::BrokerConfig;
use tether_broker::infrastructure::run_broker;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Tether connection broker.
///
/// Grants exclusive, queued control of remote devices to remote controllers
/// over persistent WebSocket connections.
#[derive(Debug, Parser)]
#[command(
    name = "tether-broker",
    about = "Exclusive-control broker for remote devices and their controllers",
    version
)]
struct Cli {
    /// IP address both endpoints bind to.
    ///
    /// Use `0.0.0.0` to accept connections from any interface, or
    /// `127.0.0.1` to accept only local connections.
    #[arg(long, default_value = "0.0.0.0", env = "TETHER_BIND")]
    bind: String,

    /// TCP port for the device-facing WebSocket endpoint.
    #[arg(long, default_value_t = 8900, env = "TETHER_DEVICE_PORT")]
    device_port: u16,

    /// TCP port for the controller-facing WebSocket endpoint.
    #[arg(long, default_value_t = 8800, env = "TETHER_CONTROLLER_PORT")]
    controller_port: u16,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`BrokerConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--bind` is not a valid IP address.
    fn into_broker_config(self) -> anyhow::Result<BrokerConfig> {
        let device_bind_addr: SocketAddr = format!("{}:{}", self.bind, self.device_port)
            .parse()
            .with_context(|| format!("invalid device bind address: '{}:{}'", self.bind, self.device_port))?;
        let controller_bind_addr: SocketAddr = format!("{}:{}", self.bind, self.controller_port)
            .parse()
            .with_context(|| {
                format!(
                    "invalid controller bind address: '{}:{}'",
                    self.bind, self.controller_port
                )
            })?;

        Ok(BrokerConfig {
            device_bind_addr,
            controller_bind_addr,
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging; level overridden by RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.into_broker_config()?;

    info!(
        "Tether broker starting — devices={}, controllers={}",
        config.device_bind_addr, config.controller_bind_addr
    );

    // Registry state lives for the whole process; nothing is persisted, so
    // a restart begins with an empty registry and clients re-register.
    let broker = Arc::new(Broker::default());

    // Graceful shutdown flag, cleared by Ctrl-C.  The accept loops check it
    // every 200 ms and exit cleanly.
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C — initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_broker(config, broker, running).await?;

    info!("Tether broker stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["tether-broker"]);
        assert_eq!(cli.bind, "0.0.0.0");
        assert_eq!(cli.device_port, 8900);
        assert_eq!(cli.controller_port, 8800);
    }

    #[test]
    fn test_cli_port_overrides() {
        let cli = Cli::parse_from([
            "tether-broker",
            "--device-port",
            "9001",
            "--controller-port",
            "9002",
        ]);
        assert_eq!(cli.device_port, 9001);
        assert_eq!(cli.controller_port, 9002);
    }

    #[test]
    fn test_into_broker_config_defaults() {
        let config = Cli::parse_from(["tether-broker"]).into_broker_config().unwrap();
        assert_eq!(config.device_bind_addr.port(), 8900);
        assert_eq!(config.controller_bind_addr.port(), 8800);
    }

    #[test]
    fn test_into_broker_config_custom_bind() {
        let config = Cli::parse_from(["tether-broker", "--bind", "127.0.0.1"])
            .into_broker_config()
            .unwrap();
        assert_eq!(config.device_bind_addr.ip().to_string(), "127.0.0.1");
        assert_eq!(config.controller_bind_addr.ip().to_string(), "127.0.0.1");
    }

    #[test]
    fn test_into_broker_config_invalid_bind_returns_error() {
        let cli = Cli {
            bind: "not.an.ip".to_string(),
            device_port: 8900,
            controller_port: 8800,
        };
        assert!(cli.into_broker_config().is_err());
    }
}
