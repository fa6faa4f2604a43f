//! Recording transport backend and datagram socket.
//!
//! Allows tests (and headless demos) to drive the session core without
//! opening real sockets. Every call is recorded so assertions can check what
//! the arbitrator and the lifecycle controller asked of the backend.

use std::collections::HashSet;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rally_core::ConnectDescriptor;
use tokio::sync::{mpsc, Notify};

use super::{DatagramSocket, TransportBackend, TransportError};

/// How [`MockTransport::connect`] behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    Succeed,
    Fail,
    /// Never resolves; only `stop()` can end the attempt.
    Hang,
}

/// A mock [`TransportBackend`] with configurable capabilities.
pub struct MockTransport {
    name: String,
    available: bool,
    broadcast: bool,
    lobby_token: bool,
    endpoint: bool,
    connect_behavior: ConnectBehavior,
    fail_listen: bool,
    listen_gate: Option<Arc<Notify>>,
    game_port: u16,
    active: AtomicBool,
    listening: AtomicBool,
    activations: AtomicUsize,
    listens: AtomicUsize,
    shutdowns: AtomicUsize,
    connects: Mutex<Vec<ConnectDescriptor>>,
    socket: Arc<RecordingSocket>,
    broadcast_ports: Mutex<Vec<u16>>,
}

impl MockTransport {
    /// A plain `address:port` backend with broadcast support.
    pub fn lan(name: &str) -> Self {
        Self::with_caps(name, true, false, true)
    }

    /// A backend that only resolves lobby-service connect tokens.
    pub fn lobby(name: &str) -> Self {
        Self::with_caps(name, false, true, false)
    }

    fn with_caps(name: &str, broadcast: bool, lobby_token: bool, endpoint: bool) -> Self {
        Self {
            name: name.to_string(),
            available: true,
            broadcast,
            lobby_token,
            endpoint,
            connect_behavior: ConnectBehavior::Succeed,
            fail_listen: false,
            listen_gate: None,
            game_port: 7777,
            active: AtomicBool::new(false),
            listening: AtomicBool::new(false),
            activations: AtomicUsize::new(0),
            listens: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            connects: Mutex::new(Vec::new()),
            socket: Arc::new(RecordingSocket::new()),
            broadcast_ports: Mutex::new(Vec::new()),
        }
    }

    /// Marks the backend unavailable in this process.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Removes the broadcast capability.
    pub fn without_broadcast(mut self) -> Self {
        self.broadcast = false;
        self
    }

    pub fn with_connect(mut self, behavior: ConnectBehavior) -> Self {
        self.connect_behavior = behavior;
        self
    }

    pub fn failing_listen(mut self) -> Self {
        self.fail_listen = true;
        self
    }

    /// Makes `listen` wait for one notification on `gate` before binding.
    pub fn with_listen_gate(mut self, gate: Arc<Notify>) -> Self {
        self.listen_gate = Some(gate);
        self
    }

    /// Number of times `activate` was called.
    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// `true` between a successful `listen` and the next `shutdown`.
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    pub fn listens(&self) -> usize {
        self.listens.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Descriptors passed to `connect`, in call order.
    pub fn connects(&self) -> Vec<ConnectDescriptor> {
        lock(&self.connects).clone()
    }

    /// The socket handed out by `open_broadcast_socket`.
    pub fn socket(&self) -> Arc<RecordingSocket> {
        Arc::clone(&self.socket)
    }

    /// Ports requested through `open_broadcast_socket`.
    pub fn broadcast_ports(&self) -> Vec<u16> {
        lock(&self.broadcast_ports).clone()
    }
}

#[async_trait]
impl TransportBackend for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn supports_broadcast(&self) -> bool {
        self.broadcast
    }

    fn supports_lobby_connect_token(&self) -> bool {
        self.lobby_token
    }

    fn supports_endpoint(&self) -> bool {
        self.endpoint
    }

    fn activate(&self) -> Result<(), TransportError> {
        if !self.available {
            return Err(TransportError::Unavailable {
                backend: self.name.clone(),
            });
        }
        self.activations.fetch_add(1, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    async fn connect(&self, descriptor: &ConnectDescriptor) -> Result<(), TransportError> {
        lock(&self.connects).push(descriptor.clone());
        match self.connect_behavior {
            ConnectBehavior::Succeed => Ok(()),
            ConnectBehavior::Fail => Err(TransportError::ConnectFailed {
                target: descriptor.to_string(),
                reason: "injected failure".to_string(),
            }),
            ConnectBehavior::Hang => std::future::pending().await,
        }
    }

    async fn listen(&self) -> Result<(), TransportError> {
        self.listens.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.listen_gate {
            gate.notified().await;
        }
        if self.fail_listen {
            return Err(TransportError::ListenFailed {
                port: self.game_port,
                reason: "injected failure".to_string(),
            });
        }
        self.listening.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) {
        self.listening.store(false, Ordering::SeqCst);
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }

    fn game_port(&self) -> Option<u16> {
        Some(self.game_port)
    }

    async fn open_broadcast_socket(
        &self,
        port: u16,
    ) -> Result<Arc<dyn DatagramSocket>, TransportError> {
        if !self.broadcast {
            return Err(TransportError::BroadcastUnsupported {
                backend: self.name.clone(),
            });
        }
        lock(&self.broadcast_ports).push(port);
        let socket: Arc<dyn DatagramSocket> = self.socket();
        Ok(socket)
    }
}

/// A [`DatagramSocket`] that records outgoing datagrams and replays injected
/// inbound ones.
pub struct RecordingSocket {
    sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    failing_targets: Mutex<HashSet<SocketAddr>>,
    inbound_tx: mpsc::UnboundedSender<(Vec<u8>, SocketAddr)>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>>,
}

impl RecordingSocket {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            sent: Mutex::new(Vec::new()),
            failing_targets: Mutex::new(HashSet::new()),
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
        }
    }

    /// Queues a datagram for the next `recv_from`, as if sent by `from`.
    pub fn inject(&self, bytes: Vec<u8>, from: SocketAddr) {
        // The receiver lives as long as `self`, so the send cannot fail.
        let _ = self.inbound_tx.send((bytes, from));
    }

    /// Makes every `send_to` towards `target` fail.
    pub fn fail_sends_to(&self, target: SocketAddr) {
        lock(&self.failing_targets).insert(target);
    }

    /// All datagrams successfully sent so far.
    pub fn sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        lock(&self.sent).clone()
    }

    /// Destination addresses of all sent datagrams, in order.
    pub fn sent_targets(&self) -> Vec<SocketAddr> {
        self.sent().into_iter().map(|(_, addr)| addr).collect()
    }
}

impl Default for RecordingSocket {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatagramSocket for RecordingSocket {
    async fn send_to(&self, bytes: &[u8], target: SocketAddr) -> io::Result<usize> {
        if lock(&self.failing_targets).contains(&target) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "injected send failure",
            ));
        }
        lock(&self.sent).push((bytes.to_vec(), target));
        Ok(bytes.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let mut rx = self.inbound_rx.lock().await;
        match rx.recv().await {
            Some((bytes, from)) => {
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Ok((len, from))
            }
            None => std::future::pending().await,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
