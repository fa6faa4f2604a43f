//! Plain `address:port` transport backend on tokio TCP sockets.
//!
//! Hosting binds a `TcpListener` on the configured game port and accepts
//! players in a background task. Each player socket is held by its own task
//! until the peer closes it. Joining opens a single `TcpStream` to the
//! host's endpoint. What the game sends over those sockets is not this
//! module's concern.
//!
//! The backend also provides the UDP broadcast capability LAN discovery
//! uses: a socket with `SO_BROADCAST` set, bound to either an ephemeral port
//! (browsing) or the discovery port (answering probes while hosting).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rally_core::ConnectDescriptor;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use super::{DatagramSocket, TransportBackend, TransportError};

pub const TCP_BACKEND_NAME: &str = "tcp";

/// Configuration for [`TcpTransport`].
#[derive(Debug, Clone)]
pub struct TcpTransportConfig {
    /// Address the host listener binds to.
    pub bind_address: IpAddr,
    /// Port the host listener binds to. 0 picks an ephemeral port.
    pub game_port: u16,
    /// Upper bound on a single connect attempt.
    pub connect_timeout: Duration,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            game_port: 7777,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// TCP transport backend.
pub struct TcpTransport {
    config: TcpTransportConfig,
    active: AtomicBool,
    bound_port: AtomicU16,
    players: Arc<AtomicUsize>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    stream: tokio::sync::Mutex<Option<TcpStream>>,
}

impl TcpTransport {
    pub fn new(config: TcpTransportConfig) -> Self {
        Self {
            config,
            active: AtomicBool::new(false),
            bound_port: AtomicU16::new(0),
            players: Arc::new(AtomicUsize::new(0)),
            accept_task: Mutex::new(None),
            stream: tokio::sync::Mutex::new(None),
        }
    }

    /// Players currently connected to the hosted listener.
    pub fn connected_players(&self) -> usize {
        self.players.load(Ordering::Acquire)
    }

    /// Whether the arbitrator currently has this backend active.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn replace_accept_task(&self, task: Option<JoinHandle<()>>) {
        let mut guard = self
            .accept_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = std::mem::replace(&mut *guard, task) {
            previous.abort();
        }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(TcpTransportConfig::default())
    }
}

#[async_trait]
impl TransportBackend for TcpTransport {
    fn name(&self) -> &str {
        TCP_BACKEND_NAME
    }

    fn is_available(&self) -> bool {
        true
    }

    fn supports_broadcast(&self) -> bool {
        true
    }

    fn supports_lobby_connect_token(&self) -> bool {
        false
    }

    fn supports_endpoint(&self) -> bool {
        true
    }

    fn activate(&self) -> Result<(), TransportError> {
        if !self.active.swap(true, Ordering::AcqRel) {
            info!("tcp transport activated");
        }
        Ok(())
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    async fn connect(&self, descriptor: &ConnectDescriptor) -> Result<(), TransportError> {
        let addr = match descriptor {
            ConnectDescriptor::Endpoint(addr) => *addr,
            ConnectDescriptor::LobbyToken(_) => {
                return Err(TransportError::UnsupportedDescriptor {
                    backend: TCP_BACKEND_NAME.to_string(),
                    descriptor: descriptor.to_string(),
                })
            }
        };

        let connect = TcpStream::connect(addr);
        let stream = match tokio::time::timeout(self.config.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(TransportError::ConnectFailed {
                    target: addr.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(TransportError::ConnectFailed {
                    target: addr.to_string(),
                    reason: format!("timed out after {:?}", self.config.connect_timeout),
                })
            }
        };
        stream.set_nodelay(true).ok();

        info!("connected to host at {addr}");
        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn listen(&self) -> Result<(), TransportError> {
        let addr = SocketAddr::new(self.config.bind_address, self.config.game_port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::ListenFailed {
                port: self.config.game_port,
                reason: e.to_string(),
            })?;
        let local = listener
            .local_addr()
            .map_err(|e| TransportError::ListenFailed {
                port: self.config.game_port,
                reason: e.to_string(),
            })?;
        self.bound_port.store(local.port(), Ordering::Release);

        let count = Arc::clone(&self.players);
        let task = tokio::spawn(async move {
            // Dropping the set with the accept task closes every player.
            let mut players = JoinSet::new();
            loop {
                tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            debug!("player connected from {peer}");
                            players.spawn(hold_player(stream, peer));
                        }
                        Err(e) => {
                            warn!("accept error on game port: {e}");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    },
                    Some(_) = players.join_next(), if !players.is_empty() => {}
                }
                count.store(players.len(), Ordering::Release);
            }
        });
        self.replace_accept_task(Some(task));

        info!("tcp transport listening on {local}");
        Ok(())
    }

    async fn shutdown(&self) {
        self.replace_accept_task(None);
        self.bound_port.store(0, Ordering::Release);
        self.players.store(0, Ordering::Release);
        if self.stream.lock().await.take().is_some() {
            debug!("closed connection to host");
        }
    }

    fn game_port(&self) -> Option<u16> {
        match self.bound_port.load(Ordering::Acquire) {
            0 => None,
            port => Some(port),
        }
    }

    async fn open_broadcast_socket(
        &self,
        port: u16,
    ) -> Result<Arc<dyn DatagramSocket>, TransportError> {
        let socket = bind_broadcast_socket(port)
            .map_err(|e| TransportError::Broadcast(format!("bind UDP {port}: {e}")))?;
        Ok(Arc::new(socket))
    }
}

/// Keeps a player's socket open until the peer closes it.
async fn hold_player(mut stream: TcpStream, peer: SocketAddr) {
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("player {peer} connection error: {e}");
                break;
            }
        }
    }
    debug!("player {peer} disconnected");
}

fn bind_broadcast_socket(port: u16) -> std::io::Result<UdpSocket> {
    let std_socket =
        std::net::UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))?;
    std_socket.set_nonblocking(true)?;
    std_socket.set_broadcast(true)?;
    UdpSocket::from_std(std_socket)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
