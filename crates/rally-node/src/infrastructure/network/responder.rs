//! Host side of LAN discovery.
//!
//! While a session is hosted in local-network mode, the host binds a UDP
//! socket on the discovery port and answers every valid `DiscoveryRequest`
//! with a unicast `DiscoveryResponse` sent back to the requester's source
//! address. The response carries the host's session id, display name and
//! game port; the browser takes the IP from the datagram's source.
//!
//! [`LanAdvertiser`] plugs this into the connection lifecycle: it starts a
//! [`BroadcastResponder`] when hosting begins and stops it when that hosting
//! attempt ends. Failures are logged and never affect the hosted session
//! itself.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rally_core::protocol::messages::MAX_PACKET_SIZE;
use rally_core::{
    decode_packet, encode_packet, ConnectionState, DiscoveryPacket, DiscoveryResponse,
    HandshakeTag, ProtocolError, SessionId, SessionMode,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::connection_lifecycle::{HostedSession, SessionObserver};
use crate::infrastructure::transport::DatagramSocket;

/// What a host advertises to browsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedSession {
    pub server_id: SessionId,
    pub display_name: String,
    pub game_port: u16,
}

/// Answers discovery requests on a bound socket until stopped or dropped.
pub struct BroadcastResponder {
    task: JoinHandle<()>,
}

impl BroadcastResponder {
    /// Spawns the answer loop on `socket`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] if the response cannot be encoded (for
    /// example a display name too long for one datagram).
    pub fn spawn(
        socket: Arc<dyn DatagramSocket>,
        handshake: HandshakeTag,
        session: AdvertisedSession,
    ) -> Result<Self, ProtocolError> {
        let response = encode_packet(
            &DiscoveryPacket::Response(DiscoveryResponse {
                server_id: session.server_id,
                display_name: session.display_name,
                game_port: session.game_port,
            }),
            handshake,
        )?;
        let task = tokio::spawn(answer_loop(socket, handshake, response));
        Ok(Self { task })
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for BroadcastResponder {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn answer_loop(socket: Arc<dyn DatagramSocket>, handshake: HandshakeTag, response: Vec<u8>) {
    let mut buf = vec![0u8; MAX_PACKET_SIZE];
    loop {
        let (len, src) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("discovery responder recv error: {e}");
                tokio::time::sleep(Duration::from_millis(200)).await;
                continue;
            }
        };

        match decode_packet(&buf[..len], handshake) {
            Ok(DiscoveryPacket::Request) => answer(socket.as_ref(), &response, src).await,
            Ok(DiscoveryPacket::Response(_)) => {
                debug!("ignoring discovery response from {src} on the host socket");
            }
            Err(e) => debug!("failed to decode discovery datagram from {src}: {e}"),
        }
    }
}

async fn answer(socket: &dyn DatagramSocket, response: &[u8], dest: SocketAddr) {
    match socket.send_to(response, dest).await {
        Ok(_) => debug!("answered discovery request from {dest}"),
        Err(e) => warn!("failed to send discovery response to {dest}: {e}"),
    }
}

/// Advertises hosted local-network sessions on the discovery port.
pub struct LanAdvertiser {
    discovery_port: u16,
    handshake: HandshakeTag,
    /// The running responder and the hosting attempt it advertises.
    responder: Mutex<Option<(u64, BroadcastResponder)>>,
}

impl LanAdvertiser {
    pub fn new(discovery_port: u16, handshake: HandshakeTag) -> Self {
        Self {
            discovery_port,
            handshake,
            responder: Mutex::new(None),
        }
    }

    pub fn is_advertising(&self) -> bool {
        self.lock_responder().is_some()
    }

    fn lock_responder(&self) -> std::sync::MutexGuard<'_, Option<(u64, BroadcastResponder)>> {
        self.responder.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionObserver for LanAdvertiser {
    async fn on_hosting_started(&self, session: &HostedSession) {
        if session.mode != SessionMode::LocalNetwork {
            return;
        }
        let backend = &session.backend;
        if !backend.supports_broadcast() {
            debug!(
                "transport {} cannot broadcast; hosted session will not be advertised",
                backend.name()
            );
            return;
        }

        let socket = match backend.open_broadcast_socket(self.discovery_port).await {
            Ok(socket) => socket,
            Err(e) => {
                warn!("could not open discovery responder socket: {e}");
                return;
            }
        };

        let advertised = AdvertisedSession {
            server_id: Uuid::new_v4().as_u64_pair().0,
            display_name: session.display_name.clone(),
            game_port: backend.game_port().unwrap_or_default(),
        };
        let server_id = advertised.server_id;
        match BroadcastResponder::spawn(socket, self.handshake, advertised) {
            Ok(responder) => {
                *self.lock_responder() = Some((session.attempt, responder));
                info!(
                    "advertising session {server_id} on UDP port {}",
                    self.discovery_port
                );
            }
            Err(e) => warn!("could not advertise hosted session: {e}"),
        }
    }

    async fn on_session_ended(&self, _previous: ConnectionState, attempt: u64) {
        let mut slot = self.lock_responder();
        match slot.take() {
            Some((owner, responder)) if owner == attempt => {
                responder.stop();
                info!("stopped advertising hosted session");
            }
            other => *slot = other,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
