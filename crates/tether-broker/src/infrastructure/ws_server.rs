//! WebSocket server: the two accept loops and per-connection task
//! management.
//!
//! This module is responsible for:
//!
//! 1. Binding TCP listeners on the device and controller endpoints.
//! 2. Upgrading each accepted connection to a WebSocket session.
//! 3. Running one writer task per connection that drains the connection's
//!    outbound queue into the WebSocket sink.
//! 4. Reading the connection's first text frame and handing it to the
//!    control protocol as the registration message.
//! 5. Running the relay loop: every subsequent data frame is forwarded
//!    through the broker, which resolves the paired connection freshly per
//!    message.
//! 6. Invoking disconnect reconciliation exactly once when the transport
//!    closes.
//!
//! # Scalability
//!
//! Each connection runs in its own Tokio task; the accept loops never block
//! on a session.  The only serialization point is the broker's registry
//! mutex, which is held only for individual mutations, never across I/O.
//!
//! # Shutdown
//!
//! Both accept loops use a short timeout on `accept()` so they can observe
//! the shared `AtomicBool` shutdown flag set by the Ctrl-C handler in
//! `main.rs`.  Sessions already in flight end when their transport closes.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::Message as WsMessage,
    WebSocketStream,
};
use tracing::{debug, error, info, warn};

use tether_core::{Frame, RegistrationError};

use crate::application::handle::{Outbound, PeerHandle};
use crate::application::Broker;
use crate::domain::BrokerConfig;

/// Which endpoint a connection arrived on, and therefore which registration
/// protocol applies to its first message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Device,
    Controller,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::Device => "device",
            Role::Controller => "controller",
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds both listening endpoints and runs their accept loops until the
/// shutdown flag is cleared.
///
/// # Errors
///
/// Returns an error if either listener cannot be bound (port in use,
/// insufficient permissions).
pub async fn run_broker(
    config: BrokerConfig,
    broker: Arc<Broker>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let device_listener = TcpListener::bind(config.device_bind_addr)
        .await
        .with_context(|| format!("failed to bind device listener on {}", config.device_bind_addr))?;
    let controller_listener = TcpListener::bind(config.controller_bind_addr)
        .await
        .with_context(|| {
            format!(
                "failed to bind controller listener on {}",
                config.controller_bind_addr
            )
        })?;

    info!("device endpoint listening on {}", config.device_bind_addr);
    info!("controller endpoint listening on {}", config.controller_bind_addr);

    tokio::try_join!(
        accept_loop(device_listener, Role::Device, Arc::clone(&broker), Arc::clone(&running)),
        accept_loop(controller_listener, Role::Controller, broker, running),
    )?;
    Ok(())
}

/// Accepts connections on one endpoint until the shutdown flag is cleared,
/// spawning a dedicated task per connection.
///
/// Public so integration tests can run an endpoint on an ephemeral port.
pub async fn accept_loop(
    listener: TcpListener,
    role: Role,
    broker: Arc<Broker>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping {} accept loop", role.as_str());
            break;
        }

        // Short timeout so the loop can observe the shutdown flag even when
        // nothing is connecting.
        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                info!("new {} connection from {peer_addr}", role.as_str());
                let broker = Arc::clone(&broker);
                tokio::spawn(async move {
                    handle_connection(stream, peer_addr, role, broker).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g. fd exhaustion); keep serving.
                error!("{} accept error: {e}", role.as_str());
            }
            Err(_) => {
                // Timeout; loop back to check the flag.
            }
        }
    }
    Ok(())
}

// ── Per-connection handler ────────────────────────────────────────────────────

/// Entry point of each per-connection task; wraps [`run_connection`] and
/// logs the outcome.
async fn handle_connection(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    role: Role,
    broker: Arc<Broker>,
) {
    match run_connection(raw_stream, peer_addr, role, broker).await {
        Ok(()) => info!("{} session {peer_addr} closed", role.as_str()),
        Err(e) => warn!("{} session {peer_addr} closed with error: {e:#}", role.as_str()),
    }
}

/// Runs the complete lifecycle of one connection: handshake, registration,
/// relay loop, reconciliation.
async fn run_connection(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    role: Role,
    broker: Arc<Broker>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(raw_stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let (ws_tx, mut ws_rx) = ws_stream.split();

    // All outbound traffic (relayed payloads, status notifications) goes
    // through this queue; the writer task is the only owner of the sink.
    let (tx, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(run_writer(ws_tx, rx));
    let handle = PeerHandle::new(tx);
    let conn = handle.id();

    // ── Registration phase ────────────────────────────────────────────────────
    //
    // The first data frame carries the JSON registration message.  There is
    // no registration timeout: transport closure is the sole cancellation
    // mechanism.
    let initial = match read_initial_message(&mut ws_rx).await {
        InitialRead::Message(text) => text,
        InitialRead::NotText => {
            // Binary initial data cannot be the structured message.
            let err = RegistrationError::MalformedInitial("expected a text frame".into());
            warn!("{} {peer_addr} rejected: {err}", role.as_str());
            handle.send_status(err.rejection());
            handle.close();
            let _ = writer.await;
            return Ok(());
        }
        InitialRead::Closed => {
            debug!("{} {peer_addr} closed before registering", role.as_str());
            handle.close();
            let _ = writer.await;
            return Ok(());
        }
    };

    let registered = match role {
        Role::Device => broker.register_device(&initial, handle.clone()).await,
        Role::Controller => broker.register_controller(&initial, handle.clone()).await,
    };

    let device_id = match registered {
        Ok(id) => id,
        Err(err) => {
            // Fatal to this connection only; the registry was not touched.
            warn!("{} {peer_addr} rejected: {err}", role.as_str());
            handle.send_status(err.rejection());
            handle.close();
            let _ = writer.await;
            return Ok(());
        }
    };

    // ── Relay phase ───────────────────────────────────────────────────────────
    //
    // Forward every data frame via the broker, which re-resolves the paired
    // connection per message.  Protocol ping/pong is handled by tungstenite.
    while let Some(msg) = ws_rx.next().await {
        let frame = match msg {
            Ok(WsMessage::Text(text)) => Frame::Text(text),
            Ok(WsMessage::Binary(bytes)) => Frame::Binary(bytes),
            Ok(WsMessage::Close(_)) => break,
            Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_)) => continue,
            Err(e) => {
                debug!("{} {peer_addr} transport error: {e}", role.as_str());
                break;
            }
        };
        match role {
            Role::Device => broker.forward_from_device(conn, frame).await,
            Role::Controller => broker.forward_from_controller(conn, frame).await,
        }
    }

    // ── Reconciliation ────────────────────────────────────────────────────────
    debug!("{} {peer_addr} disconnected from {device_id}", role.as_str());
    broker.disband(conn).await;
    handle.close();
    let _ = writer.await;
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

enum InitialRead {
    /// First data frame, as registration text.
    Message(String),
    /// First data frame was not text (cannot be the structured message).
    NotText,
    /// The transport closed before any data frame arrived.
    Closed,
}

/// Reads frames until the first data frame, skipping protocol-level
/// ping/pong noise.
async fn read_initial_message(
    ws_rx: &mut SplitStream<WebSocketStream<TcpStream>>,
) -> InitialRead {
    loop {
        match ws_rx.next().await {
            Some(Ok(WsMessage::Text(text))) => return InitialRead::Message(text),
            Some(Ok(WsMessage::Binary(_))) => return InitialRead::NotText,
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => continue,
            Some(Ok(WsMessage::Close(_))) | None => return InitialRead::Closed,
            Some(Err(_)) => return InitialRead::Closed,
        }
    }
}

/// Drains one connection's outbound queue into its WebSocket sink.
///
/// Ends when the queue's senders are gone, an explicit `Close` arrives, or
/// the sink fails.  A sink failure here is how a dead peer is detected; the
/// peer's receive loop observes the same transport failure and runs
/// reconciliation — nothing is retried.
async fn run_writer(
    mut sink: SplitSink<WebSocketStream<TcpStream>, WsMessage>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(out) = rx.recv().await {
        let msg = match out {
            Outbound::Frame(Frame::Text(text)) => WsMessage::Text(text),
            Outbound::Frame(Frame::Binary(bytes)) => WsMessage::Binary(bytes),
            Outbound::Status(status) => WsMessage::Text(status.to_string()),
            Outbound::Close => {
                let _ = sink.send(WsMessage::Close(None)).await;
                break;
            }
        };
        if sink.send(msg).await.is_err() {
            break;
        }
    }
}
