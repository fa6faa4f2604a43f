//! LAN broadcast discovery adapter.
//!
//! A browsing node opens a broadcast-capable UDP socket through the active
//! transport backend and sends a `DiscoveryRequest` to:
//!
//! 1. the configured default target (normally `255.255.255.255`),
//! 2. the loopback address, so a host on the same machine answers,
//! 3. the directed broadcast address of every up IPv4 interface.
//!
//! Hosts answer with a unicast `DiscoveryResponse`. A background task reads
//! the responses and turns each one into a [`DiscoveryEvent`] on an `mpsc`
//! channel; the application layer pumps that channel into the session
//! registry.
//!
//! Nothing here is fatal. A backend without broadcast support, a failed send,
//! or an undecodable datagram is logged and discovery carries on.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rally_core::protocol::messages::MAX_PACKET_SIZE;
use rally_core::{
    decode_packet, encode_packet, ConnectDescriptor, DiscoveryEvent, DiscoveryPacket,
    DiscoverySource, HandshakeTag, SessionError,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::interfaces::{subnet_broadcast_targets, InterfaceSource};
use crate::infrastructure::transport::{DatagramSocket, TransportBackend};

/// Default UDP port for discovery traffic.
pub const DEFAULT_DISCOVERY_PORT: u16 = 47777;

/// Configuration for [`BroadcastDiscovery`].
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Port hosts listen on for requests.
    pub port: u16,
    /// Persistent broadcast target. Per-interface probes never change it.
    pub default_target: Ipv4Addr,
    pub handshake: HandshakeTag,
}

impl BroadcastConfig {
    pub fn new(port: u16, handshake: HandshakeTag) -> Self {
        Self {
            port,
            default_target: Ipv4Addr::BROADCAST,
            handshake,
        }
    }
}

/// Outcome of one [`BroadcastDiscovery::probe`] call.
#[derive(Debug, Default)]
pub struct ProbeReport {
    /// Targets the request was sent to.
    pub sent: Vec<SocketAddr>,
    /// One [`SessionError::DiscoveryProbeFailed`] per target that failed.
    pub failures: Vec<SessionError>,
}

struct RunningDiscovery {
    socket: Arc<dyn DatagramSocket>,
    recv_task: JoinHandle<()>,
}

/// Solicits responses from hosts reachable by LAN broadcast.
pub struct BroadcastDiscovery {
    config: BroadcastConfig,
    interfaces: Arc<dyn InterfaceSource>,
    running: Mutex<Option<RunningDiscovery>>,
}

impl BroadcastDiscovery {
    pub fn new(config: BroadcastConfig, interfaces: Arc<dyn InterfaceSource>) -> Self {
        Self {
            config,
            interfaces,
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    /// Binds to `transport`'s broadcast capability and starts reading
    /// responses.
    ///
    /// Returns the receiver on which discovery events arrive, or `None` if the
    /// backend has no broadcast support or the socket could not be opened.
    /// A previous run is stopped first.
    pub async fn start_discovery(
        &self,
        transport: &dyn TransportBackend,
    ) -> Option<mpsc::Receiver<DiscoveryEvent>> {
        self.stop_discovery();

        if !transport.supports_broadcast() {
            warn!(
                "transport {} has no broadcast support; LAN discovery disabled",
                transport.name()
            );
            return None;
        }

        let socket = match transport.open_broadcast_socket(0).await {
            Ok(socket) => socket,
            Err(e) => {
                warn!("could not open discovery socket: {e}");
                return None;
            }
        };

        let (tx, rx) = mpsc::channel(64);
        let recv_task = tokio::spawn(receive_loop(
            Arc::clone(&socket),
            self.config.handshake,
            tx,
        ));

        *self.lock_running() = Some(RunningDiscovery { socket, recv_task });
        info!("LAN discovery started (port {})", self.config.port);
        Some(rx)
    }

    /// Sends one discovery request to every probe target.
    ///
    /// Calls are independent: nothing is queued, and a failed target does not
    /// stop the others. Probing before `start_discovery` (or after
    /// `stop_discovery`) sends nothing.
    pub async fn probe(&self) -> ProbeReport {
        let mut report = ProbeReport::default();
        let socket = match self.lock_running().as_ref() {
            Some(running) => Arc::clone(&running.socket),
            None => {
                debug!("probe skipped: discovery not started");
                return report;
            }
        };

        let request = match encode_packet(&DiscoveryPacket::Request, self.config.handshake) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("failed to encode discovery request: {e}");
                return report;
            }
        };

        for target in self.probe_targets() {
            match socket.send_to(&request, target).await {
                Ok(_) => {
                    debug!("discovery request sent to {target}");
                    report.sent.push(target);
                }
                Err(e) => {
                    let err = SessionError::DiscoveryProbeFailed {
                        target,
                        reason: e.to_string(),
                    };
                    warn!("{err}");
                    report.failures.push(err);
                }
            }
        }
        report
    }

    /// Stops reading responses. Sessions already reported stay in the
    /// registry until they go stale.
    pub fn stop_discovery(&self) {
        if let Some(running) = self.lock_running().take() {
            running.recv_task.abort();
            info!("LAN discovery stopped");
        }
    }

    /// Default target first, then loopback and subnet broadcasts when the
    /// machine has any interfaces.
    pub fn probe_targets(&self) -> Vec<SocketAddr> {
        let port = self.config.port;
        let mut targets = vec![SocketAddr::new(IpAddr::V4(self.config.default_target), port)];

        match self.interfaces.ipv4_interfaces() {
            Ok(interfaces) if interfaces.is_empty() => {}
            Ok(interfaces) => {
                targets.push(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port));
                for addr in subnet_broadcast_targets(&interfaces) {
                    targets.push(SocketAddr::new(IpAddr::V4(addr), port));
                }
            }
            Err(e) => warn!("could not enumerate network interfaces: {e}"),
        }

        let mut unique = Vec::with_capacity(targets.len());
        for target in targets {
            if !unique.contains(&target) {
                unique.push(target);
            }
        }
        unique
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<RunningDiscovery>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for BroadcastDiscovery {
    fn drop(&mut self) {
        self.stop_discovery();
    }
}

async fn receive_loop(
    socket: Arc<dyn DatagramSocket>,
    handshake: HandshakeTag,
    tx: mpsc::Sender<DiscoveryEvent>,
) {
    let mut buf = vec![0u8; MAX_PACKET_SIZE];
    loop {
        let (len, src) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("discovery recv error: {e}");
                tokio::time::sleep(Duration::from_millis(200)).await;
                continue;
            }
        };

        let Some(event) = response_to_event(&buf[..len], src, handshake) else {
            continue;
        };
        debug!("discovery response from {src}: {event:?}");
        if tx.send(event).await.is_err() {
            // Receiver dropped – nobody is pumping events any more.
            break;
        }
    }
}

/// Decodes a datagram received from `src` into a discovery event.
///
/// Returns `None` for requests, foreign traffic and malformed packets.
pub fn response_to_event(
    datagram: &[u8],
    src: SocketAddr,
    handshake: HandshakeTag,
) -> Option<DiscoveryEvent> {
    match decode_packet(datagram, handshake) {
        Ok(DiscoveryPacket::Response(response)) => Some(DiscoveryEvent {
            source: DiscoverySource::Broadcast,
            id: response.server_id,
            display_name: Some(response.display_name).filter(|name| !name.is_empty()),
            descriptor: ConnectDescriptor::Endpoint(SocketAddr::new(
                src.ip(),
                response.game_port,
            )),
        }),
        Ok(DiscoveryPacket::Request) => None,
        Err(e) => {
            debug!("ignored datagram from {src}: {e}");
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::network::interfaces::{Ipv4Interface, StaticInterfaces};
    use crate::infrastructure::transport::mock::MockTransport;
    use rally_core::DiscoveryResponse;

    fn tag() -> HandshakeTag {
        HandshakeTag::from_app_name("rally")
    }

    fn discovery(interfaces: StaticInterfaces) -> BroadcastDiscovery {
        BroadcastDiscovery::new(BroadcastConfig::new(47777, tag()), Arc::new(interfaces))
    }

    fn eth0() -> Ipv4Interface {
        Ipv4Interface {
            name: "eth0".into(),
            address: Ipv4Addr::new(192, 168, 1, 20),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            is_up: true,
            is_loopback: false,
        }
    }

    fn response_bytes(server_id: u64, name: &str, port: u16) -> Vec<u8> {
        encode_packet(
            &DiscoveryPacket::Response(DiscoveryResponse {
                server_id,
                display_name: name.to_string(),
                game_port: port,
            }),
            tag(),
        )
        .unwrap()
    }

    #[test]
    fn test_probe_targets_without_interfaces_is_default_only() {
        let d = discovery(StaticInterfaces::none());
        assert_eq!(
            d.probe_targets(),
            vec!["255.255.255.255:47777".parse::<SocketAddr>().unwrap()]
        );
    }

    #[test]
    fn test_probe_targets_with_interface_adds_loopback_and_subnet() {
        let d = discovery(StaticInterfaces::new(vec![eth0()]));
        let targets: Vec<String> = d.probe_targets().iter().map(|t| t.to_string()).collect();
        assert_eq!(
            targets,
            vec![
                "255.255.255.255:47777",
                "127.0.0.1:47777",
                "192.168.1.255:47777"
            ]
        );
    }

    #[test]
    fn test_response_to_event_uses_source_ip_and_advertised_port() {
        // Arrange
        let src: SocketAddr = "192.168.1.50:47777".parse().unwrap();

        // Act
        let event = response_to_event(&response_bytes(9, "den", 7000), src, tag()).unwrap();

        // Assert
        assert_eq!(event.source, DiscoverySource::Broadcast);
        assert_eq!(event.id, 9);
        assert_eq!(event.display_name.as_deref(), Some("den"));
        assert_eq!(
            event.descriptor,
            ConnectDescriptor::Endpoint("192.168.1.50:7000".parse().unwrap())
        );
    }

    #[test]
    fn test_response_with_empty_name_has_no_display_name() {
        let src: SocketAddr = "10.0.0.1:1".parse().unwrap();
        let event = response_to_event(&response_bytes(1, "", 7777), src, tag()).unwrap();
        assert_eq!(event.display_name, None);
    }

    #[test]
    fn test_request_packets_are_not_events() {
        let bytes = encode_packet(&DiscoveryPacket::Request, tag()).unwrap();
        let src: SocketAddr = "10.0.0.1:1".parse().unwrap();
        assert!(response_to_event(&bytes, src, tag()).is_none());
    }

    #[tokio::test]
    async fn test_start_fails_silently_without_broadcast_support() {
        let d = discovery(StaticInterfaces::none());
        let backend = MockTransport::lobby("relay");
        assert!(d.start_discovery(&backend).await.is_none());
        assert!(!d.is_running());
    }

    #[tokio::test]
    async fn test_probe_before_start_sends_nothing() {
        let d = discovery(StaticInterfaces::new(vec![eth0()]));
        let report = d.probe().await;
        assert!(report.sent.is_empty());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_failed_target_does_not_stop_other_probes() {
        // Arrange
        let d = discovery(StaticInterfaces::new(vec![eth0()]));
        let backend = MockTransport::lan("lan");
        let socket = backend.socket();
        socket.fail_sends_to("127.0.0.1:47777".parse().unwrap());
        let _rx = d.start_discovery(&backend).await.expect("started");

        // Act
        let report = d.probe().await;

        // Assert
        assert_eq!(report.sent.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0],
            SessionError::DiscoveryProbeFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_repeated_probes_are_additive() {
        let d = discovery(StaticInterfaces::none());
        let backend = MockTransport::lan("lan");
        let _rx = d.start_discovery(&backend).await.expect("started");

        d.probe().await;
        d.probe().await;

        assert_eq!(backend.socket().sent().len(), 2);
    }

    #[tokio::test]
    async fn test_injected_response_arrives_as_event() {
        // Arrange
        let d = discovery(StaticInterfaces::none());
        let backend = MockTransport::lan("lan");
        let mut rx = d.start_discovery(&backend).await.expect("started");

        // Act
        backend
            .socket()
            .inject(response_bytes(77, "attic", 7777), "10.1.1.1:47777".parse().unwrap());
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event in time")
            .expect("channel open");

        // Assert
        assert_eq!(event.id, 77);
    }

    #[tokio::test]
    async fn test_stop_then_probe_sends_nothing() {
        let d = discovery(StaticInterfaces::none());
        let backend = MockTransport::lan("lan");
        let _rx = d.start_discovery(&backend).await.expect("started");

        d.stop_discovery();
        let report = d.probe().await;

        assert!(!d.is_running());
        assert!(report.sent.is_empty());
    }
}
