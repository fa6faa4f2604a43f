//! Transport backend capability and its implementations.
//!
//! A transport backend is a swappable network transport: something that can
//! listen for players while hosting and connect to a host while joining. The
//! byte-level protocol spoken over the connection belongs to the backend; the
//! session core only needs the capabilities below.
//!
//! # Registration instead of lookup
//!
//! Backends are handed to the
//! [`TransportArbitrator`](crate::application::transport_arbitrator::TransportArbitrator)
//! at startup with `register`. An optional backend that is compiled out or
//! cannot run on this machine is simply never registered (or reports
//! `is_available() == false`); nothing is looked up by name at runtime.
//!
//! # Sub-modules
//!
//! - **`tcp`** – Plain `address:port` backend on tokio TCP sockets. Also owns
//!   the UDP broadcast capability used by LAN discovery.
//! - **`mock`** – Recording backend and datagram socket for tests and
//!   headless demos.

pub mod mock;
pub mod tcp;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use rally_core::ConnectDescriptor;
use thiserror::Error;
use tokio::net::UdpSocket;

/// Errors reported by a transport backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The backend cannot run in this process.
    #[error("transport {backend} is not available")]
    Unavailable { backend: String },

    /// The descriptor belongs to a transport family this backend cannot speak.
    #[error("transport {backend} cannot connect to {descriptor}")]
    UnsupportedDescriptor { backend: String, descriptor: String },

    #[error("connect to {target} failed: {reason}")]
    ConnectFailed { target: String, reason: String },

    #[error("listen on port {port} failed: {reason}")]
    ListenFailed { port: u16, reason: String },

    /// The backend has no broadcast capability.
    #[error("transport {backend} does not support broadcast")]
    BroadcastUnsupported { backend: String },

    /// The broadcast socket could not be opened.
    #[error("broadcast socket error: {0}")]
    Broadcast(String),
}

/// Minimal datagram socket used by broadcast discovery.
///
/// Implemented for [`tokio::net::UdpSocket`]; tests substitute
/// [`mock::RecordingSocket`].
#[async_trait]
pub trait DatagramSocket: Send + Sync {
    async fn send_to(&self, bytes: &[u8], target: SocketAddr) -> io::Result<usize>;

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

#[async_trait]
impl DatagramSocket for UdpSocket {
    async fn send_to(&self, bytes: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, bytes, target).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }
}

/// A network transport implementation the arbitrator can activate.
#[async_trait]
pub trait TransportBackend: Send + Sync {
    /// Stable name used by the configured preference list.
    fn name(&self) -> &str;

    /// Whether this backend can run in the current process.
    fn is_available(&self) -> bool;

    /// Whether the backend can open a UDP broadcast socket for LAN discovery.
    fn supports_broadcast(&self) -> bool;

    /// Whether the backend resolves lobby-service connect tokens.
    fn supports_lobby_connect_token(&self) -> bool;

    /// Whether the backend connects to plain `address:port` endpoints.
    fn supports_endpoint(&self) -> bool;

    /// Makes this backend the process's active transport.
    ///
    /// Called only by the arbitrator, which deactivates the previous backend
    /// first.
    fn activate(&self) -> Result<(), TransportError>;

    /// Releases the "active" role. Default: nothing to release.
    fn deactivate(&self) {}

    /// Connects to a host. Connect timeouts are the backend's responsibility.
    async fn connect(&self, descriptor: &ConnectDescriptor) -> Result<(), TransportError>;

    /// Starts accepting players.
    async fn listen(&self) -> Result<(), TransportError>;

    /// Tears down any connection or listener. Safe to call when idle.
    async fn shutdown(&self);

    /// Port players should connect to while this backend is listening.
    fn game_port(&self) -> Option<u16> {
        None
    }

    /// Opens a broadcast-capable datagram socket bound to `port` (0 = any).
    async fn open_broadcast_socket(
        &self,
        port: u16,
    ) -> Result<Arc<dyn DatagramSocket>, TransportError> {
        let _ = port;
        Err(TransportError::BroadcastUnsupported {
            backend: self.name().to_string(),
        })
    }
}
