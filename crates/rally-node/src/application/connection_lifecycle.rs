//! Connection lifecycle controller.
//!
//! A small state machine gating `host`, `join` and `stop` against the
//! process's single [`ConnectionState`]:
//!
//! ```text
//!            host()                      join()
//!   Idle ───────────► Hosting     Idle ───────► Connecting ──► Connected
//!    ▲                   │          ▲               │              │
//!    └──── stop() ───────┘          └── stop() / connect failure ──┘
//! ```
//!
//! - `host` and `join` are only valid from `Idle`. Anything else is rejected
//!   with [`SessionError::InvalidStateTransition`] and changes nothing.
//! - Both run the [`TransportArbitrator`] first; no state changes unless a
//!   backend was selected.
//! - The new state is claimed *before* the first `.await`, so a second call
//!   racing the first sees the non-idle state and is rejected.
//! - `stop` is the only cancellation primitive. It also aborts a join that is
//!   still waiting for the backend, and is a no-op when already idle.
//!
//! Every transition is published on a `watch` channel. Interested parties
//! (the lobby lifecycle manager, the LAN advertiser) also receive explicit
//! [`SessionObserver`] callbacks when hosting starts and when a session ends,
//! including an abnormal end reported through
//! [`ConnectionController::report_transport_lost`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rally_core::{ConnectDescriptor, ConnectionState, Operation, SessionError, SessionMode};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::transport_arbitrator::TransportArbitrator;
use crate::infrastructure::lobby::LobbyVisibility;
use crate::infrastructure::transport::TransportBackend;

/// Parameters for [`ConnectionController::host`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRequest {
    pub mode: SessionMode,
    pub display_name: String,
    pub capacity: u32,
    pub visibility: LobbyVisibility,
}

/// A session the local node has started hosting.
#[derive(Clone)]
pub struct HostedSession {
    pub mode: SessionMode,
    pub display_name: String,
    pub capacity: u32,
    pub visibility: LobbyVisibility,
    /// The backend that is listening for players.
    pub backend: Arc<dyn TransportBackend>,
    /// Identifies this hosting attempt. The matching `on_session_ended`
    /// call carries the same value.
    pub attempt: u64,
}

/// Receives lifecycle notifications from the [`ConnectionController`].
///
/// Observers are optional subsystems: they must not fail the session and
/// should log their own errors.
///
/// Callbacks of a superseded attempt can arrive after a newer session has
/// started, so an observer only releases what it acquired for `attempt`.
#[async_trait]
pub trait SessionObserver: Send + Sync {
    /// Called once the backend is listening.
    async fn on_hosting_started(&self, session: &HostedSession);

    /// Called after the controller returned to `Idle` from `previous`.
    /// `attempt` names the session that ended.
    async fn on_session_ended(&self, previous: ConnectionState, attempt: u64);
}

struct Lifecycle {
    state: ConnectionState,
    mode: Option<SessionMode>,
    backend: Option<Arc<dyn TransportBackend>>,
    /// Bumped on every host/join/stop so late completions can tell they
    /// were superseded.
    attempt: u64,
    player_template: bool,
}

/// Owner of the process's connection state.
pub struct ConnectionController {
    arbitrator: Mutex<TransportArbitrator>,
    lifecycle: Mutex<Lifecycle>,
    observers: Mutex<Vec<Arc<dyn SessionObserver>>>,
    state_tx: watch::Sender<ConnectionState>,
    cancel_tx: watch::Sender<u64>,
}

impl ConnectionController {
    pub fn new(arbitrator: TransportArbitrator) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let (cancel_tx, _) = watch::channel(0);
        Self {
            arbitrator: Mutex::new(arbitrator),
            lifecycle: Mutex::new(Lifecycle {
                state: ConnectionState::Idle,
                mode: None,
                backend: None,
                attempt: 0,
                player_template: true,
            }),
            observers: Mutex::new(Vec::new()),
            state_tx,
            cancel_tx,
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>) {
        lock(&self.observers).push(observer);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// A receiver that sees every published state change.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Mode of the current session, `None` while idle.
    pub fn active_mode(&self) -> Option<SessionMode> {
        lock(&self.lifecycle).mode
    }

    /// The backend carrying the current session, `None` while idle.
    pub fn session_backend(&self) -> Option<Arc<dyn TransportBackend>> {
        lock(&self.lifecycle).backend.clone()
    }

    /// Tells the controller whether a session/player template exists.
    /// Hosting is refused without one.
    pub fn set_player_template(&self, configured: bool) {
        lock(&self.lifecycle).player_template = configured;
    }

    /// A broadcast-capable backend for browsing, without changing the
    /// active transport.
    pub fn broadcast_backend(&self) -> Option<Arc<dyn TransportBackend>> {
        lock(&self.arbitrator).broadcast_capable()
    }

    pub fn active_transport(&self) -> Option<Arc<dyn TransportBackend>> {
        lock(&self.arbitrator).active()
    }

    /// Starts hosting a session.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidStateTransition`] unless idle.
    /// - [`SessionError::MissingPlayerTemplate`] if no template is configured.
    /// - [`SessionError::TransportUnavailable`] if no backend serves `mode`.
    /// - [`SessionError::Transport`] if the backend cannot listen.
    /// - [`SessionError::Cancelled`] if `stop()` ran while starting.
    pub async fn host(&self, request: HostRequest) -> Result<(), SessionError> {
        let (backend, attempt) = {
            let mut lifecycle = lock(&self.lifecycle);
            if lifecycle.state != ConnectionState::Idle {
                return Err(SessionError::invalid_transition(
                    Operation::Host,
                    lifecycle.state,
                ));
            }
            if !lifecycle.player_template {
                return Err(SessionError::MissingPlayerTemplate);
            }
            let backend =
                lock(&self.arbitrator).select_and_activate(request.mode, lifecycle.state)?;
            let attempt = self.claim(&mut lifecycle, ConnectionState::Hosting, request.mode, &backend);
            (backend, attempt)
        };

        if let Err(e) = backend.listen().await {
            error!("transport {} failed to listen: {e}", backend.name());
            self.abandon(attempt);
            return Err(SessionError::Transport(e.to_string()));
        }
        if !self.is_current(attempt) {
            // stop() shut the backend down before it was listening.
            self.release_backend(&backend).await;
            return Err(SessionError::Cancelled);
        }
        info!(
            "hosting {:?} in {} mode on {}",
            request.display_name,
            request.mode,
            backend.name()
        );

        let session = HostedSession {
            mode: request.mode,
            display_name: request.display_name,
            capacity: request.capacity,
            visibility: request.visibility,
            backend,
            attempt,
        };
        for observer in self.observers() {
            if !self.is_current(attempt) {
                break;
            }
            observer.on_hosting_started(&session).await;
        }

        // stop() may have run while observers were starting. Repeat the end
        // notification for this attempt only; a newer session is untouched.
        if !self.is_current(attempt) {
            self.notify_ended(ConnectionState::Hosting, attempt).await;
            return Err(SessionError::Cancelled);
        }
        Ok(())
    }

    /// Joins the session behind `target`.
    ///
    /// The mode follows from the descriptor: an endpoint needs a
    /// local-network backend, a lobby token a lobby-capable one.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidStateTransition`] unless idle.
    /// - [`SessionError::TransportUnavailable`] if no backend serves the mode.
    /// - [`SessionError::Transport`] if the backend reports a failure.
    /// - [`SessionError::Cancelled`] if `stop()` ran while connecting.
    pub async fn join(&self, target: &ConnectDescriptor) -> Result<(), SessionError> {
        let mode = target.mode();
        let (backend, attempt, mut cancel_rx) = {
            let mut lifecycle = lock(&self.lifecycle);
            if lifecycle.state != ConnectionState::Idle {
                return Err(SessionError::invalid_transition(
                    Operation::Join,
                    lifecycle.state,
                ));
            }
            let backend = lock(&self.arbitrator).select_and_activate(mode, lifecycle.state)?;
            let attempt = self.claim(&mut lifecycle, ConnectionState::Connecting, mode, &backend);
            (backend, attempt, self.cancel_tx.subscribe())
        };
        info!("connecting to {target} via {}", backend.name());

        let outcome = tokio::select! {
            result = backend.connect(target) => result,
            _ = cancel_rx.changed() => {
                debug!("connection attempt to {target} cancelled");
                return Err(SessionError::Cancelled);
            }
        };

        match outcome {
            Ok(()) => {
                let connected = {
                    let mut lifecycle = lock(&self.lifecycle);
                    let current = lifecycle.attempt == attempt
                        && lifecycle.state == ConnectionState::Connecting;
                    if current {
                        lifecycle.state = ConnectionState::Connected;
                        self.state_tx.send_replace(ConnectionState::Connected);
                    }
                    current
                };
                if connected {
                    info!("connected to {target}");
                    Ok(())
                } else {
                    self.release_backend(&backend).await;
                    Err(SessionError::Cancelled)
                }
            }
            Err(e) => {
                warn!("connection to {target} failed: {e}");
                self.abandon(attempt);
                Err(SessionError::Transport(e.to_string()))
            }
        }
    }

    /// Ends the current session. A no-op when already idle.
    pub async fn stop(&self) {
        if let Some(previous) = self.end_session().await {
            info!("session stopped (was {previous})");
        }
    }

    /// Abnormal-termination path: the transport dropped the session without
    /// a `stop()` call. Ends the session and notifies observers.
    pub async fn report_transport_lost(&self) {
        if let Some(previous) = self.end_session().await {
            warn!("transport lost while {previous}; session ended");
        }
    }

    async fn end_session(&self) -> Option<ConnectionState> {
        let (previous, ended, backend) = {
            let mut lifecycle = lock(&self.lifecycle);
            if lifecycle.state == ConnectionState::Idle {
                return None;
            }
            let previous = lifecycle.state;
            let ended = lifecycle.attempt;
            let backend = lifecycle.backend.take();
            lifecycle.state = ConnectionState::Idle;
            lifecycle.mode = None;
            lifecycle.attempt += 1;
            self.cancel_tx.send_modify(|generation| *generation += 1);
            self.state_tx.send_replace(ConnectionState::Idle);
            (previous, ended, backend)
        };

        if let Some(backend) = backend {
            backend.shutdown().await;
        }
        self.notify_ended(previous, ended).await;
        Some(previous)
    }

    fn claim(
        &self,
        lifecycle: &mut Lifecycle,
        state: ConnectionState,
        mode: SessionMode,
        backend: &Arc<dyn TransportBackend>,
    ) -> u64 {
        lifecycle.state = state;
        lifecycle.mode = Some(mode);
        lifecycle.backend = Some(Arc::clone(backend));
        lifecycle.attempt += 1;
        self.state_tx.send_replace(state);
        lifecycle.attempt
    }

    /// Returns to idle after a failed attempt, unless it was superseded.
    fn abandon(&self, attempt: u64) {
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.attempt == attempt {
            lifecycle.state = ConnectionState::Idle;
            lifecycle.mode = None;
            lifecycle.backend = None;
            self.state_tx.send_replace(ConnectionState::Idle);
        }
    }

    fn is_current(&self, attempt: u64) -> bool {
        lock(&self.lifecycle).attempt == attempt
    }

    /// Shuts down a superseded attempt's backend unless a newer session is
    /// already running on it.
    async fn release_backend(&self, backend: &Arc<dyn TransportBackend>) {
        let in_use = lock(&self.lifecycle)
            .backend
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, backend));
        if in_use {
            debug!("transport {} now carries a newer session", backend.name());
        } else {
            backend.shutdown().await;
        }
    }

    fn observers(&self) -> Vec<Arc<dyn SessionObserver>> {
        lock(&self.observers).clone()
    }

    async fn notify_ended(&self, previous: ConnectionState, attempt: u64) {
        for observer in self.observers() {
            observer.on_session_ended(previous, attempt).await;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::lobby_lifecycle::LobbyLifecycleManager;
    use crate::infrastructure::lobby::memory::InMemoryLobbyService;
    use crate::infrastructure::lobby::{LobbyDiscovery, LobbyService, META_NAME};
    use crate::infrastructure::transport::mock::{ConnectBehavior, MockTransport};
    use rally_core::HandshakeTag;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Records every observer callback in order.
    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SessionObserver for RecordingObserver {
        async fn on_hosting_started(&self, session: &HostedSession) {
            self.events
                .lock()
                .unwrap()
                .push(format!("started:{}", session.mode));
        }

        async fn on_session_ended(&self, previous: ConnectionState, _attempt: u64) {
            self.events
                .lock()
                .unwrap()
                .push(format!("ended:{previous}"));
        }
    }

    /// Holds the first `on_hosting_started` call until released.
    #[derive(Default)]
    struct GateObserver {
        calls: AtomicUsize,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl SessionObserver for GateObserver {
        async fn on_hosting_started(&self, _session: &HostedSession) {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.entered.notify_one();
                self.release.notified().await;
            }
        }

        async fn on_session_ended(&self, _previous: ConnectionState, _attempt: u64) {}
    }

    fn request(mode: SessionMode) -> HostRequest {
        HostRequest {
            mode,
            display_name: "den".to_string(),
            capacity: 4,
            visibility: LobbyVisibility::FriendsOnly,
        }
    }

    fn controller(backends: Vec<Arc<MockTransport>>) -> ConnectionController {
        let mut arb = TransportArbitrator::new(vec!["tcp".to_string()], None);
        for backend in backends {
            arb.register(backend);
        }
        ConnectionController::new(arb)
    }

    fn endpoint() -> ConnectDescriptor {
        ConnectDescriptor::Endpoint("10.0.0.5:7777".parse().unwrap())
    }

    #[tokio::test]
    async fn test_host_moves_to_hosting_and_notifies_observers() {
        // Arrange
        let tcp = Arc::new(MockTransport::lan("tcp"));
        let ctl = controller(vec![tcp.clone()]);
        let observer = Arc::new(RecordingObserver::default());
        ctl.add_observer(observer.clone());

        // Act
        ctl.host(request(SessionMode::LocalNetwork)).await.unwrap();

        // Assert
        assert_eq!(ctl.state(), ConnectionState::Hosting);
        assert_eq!(ctl.active_mode(), Some(SessionMode::LocalNetwork));
        assert_eq!(tcp.listens(), 1);
        assert_eq!(observer.events(), vec!["started:local-network"]);
    }

    #[tokio::test]
    async fn test_second_host_is_rejected_and_state_unchanged() {
        let ctl = controller(vec![Arc::new(MockTransport::lan("tcp"))]);
        ctl.host(request(SessionMode::LocalNetwork)).await.unwrap();

        let second = ctl.host(request(SessionMode::LocalNetwork)).await;

        assert_eq!(
            second,
            Err(SessionError::invalid_transition(
                Operation::Host,
                ConnectionState::Hosting
            ))
        );
        assert_eq!(ctl.state(), ConnectionState::Hosting);
    }

    #[tokio::test]
    async fn test_host_without_template_is_refused() {
        let tcp = Arc::new(MockTransport::lan("tcp"));
        let ctl = controller(vec![tcp.clone()]);
        ctl.set_player_template(false);

        let result = ctl.host(request(SessionMode::LocalNetwork)).await;

        assert_eq!(result, Err(SessionError::MissingPlayerTemplate));
        assert_eq!(ctl.state(), ConnectionState::Idle);
        assert_eq!(tcp.activations(), 0);
    }

    #[tokio::test]
    async fn test_failed_listen_returns_to_idle() {
        let ctl = controller(vec![Arc::new(MockTransport::lan("tcp").failing_listen())]);

        let result = ctl.host(request(SessionMode::LocalNetwork)).await;

        assert!(matches!(result, Err(SessionError::Transport(_))));
        assert_eq!(ctl.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_join_lobby_token_without_lobby_backend_is_unavailable() {
        let ctl = controller(vec![Arc::new(MockTransport::lan("tcp"))]);

        let result = ctl
            .join(&ConnectDescriptor::LobbyToken("host-1".to_string()))
            .await;

        assert_eq!(
            result,
            Err(SessionError::TransportUnavailable {
                mode: SessionMode::LobbyService
            })
        );
        assert_eq!(ctl.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_join_success_reaches_connected() {
        let tcp = Arc::new(MockTransport::lan("tcp"));
        let ctl = controller(vec![tcp.clone()]);
        let mut states = ctl.subscribe_state();

        ctl.join(&endpoint()).await.unwrap();

        assert_eq!(ctl.state(), ConnectionState::Connected);
        assert_eq!(tcp.connects(), vec![endpoint()]);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_join_failure_returns_to_idle() {
        let ctl = controller(vec![Arc::new(
            MockTransport::lan("tcp").with_connect(ConnectBehavior::Fail),
        )]);

        let result = ctl.join(&endpoint()).await;

        assert!(matches!(result, Err(SessionError::Transport(_))));
        assert_eq!(ctl.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_stop_cancels_pending_join() {
        // Arrange
        let tcp = Arc::new(MockTransport::lan("tcp").with_connect(ConnectBehavior::Hang));
        let ctl = Arc::new(controller(vec![tcp.clone()]));
        let joining = tokio::spawn({
            let ctl = Arc::clone(&ctl);
            async move { ctl.join(&endpoint()).await }
        });
        let mut states = ctl.subscribe_state();
        while *states.borrow_and_update() != ConnectionState::Connecting {
            states.changed().await.unwrap();
        }

        // Act
        ctl.stop().await;
        let result = tokio::time::timeout(Duration::from_secs(2), joining)
            .await
            .expect("join finished")
            .unwrap();

        // Assert
        assert_eq!(result, Err(SessionError::Cancelled));
        assert_eq!(ctl.state(), ConnectionState::Idle);
        assert_eq!(tcp.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_join_while_connecting_is_rejected() {
        let ctl = Arc::new(controller(vec![Arc::new(
            MockTransport::lan("tcp").with_connect(ConnectBehavior::Hang),
        )]));
        let _joining = tokio::spawn({
            let ctl = Arc::clone(&ctl);
            async move { ctl.join(&endpoint()).await }
        });
        let mut states = ctl.subscribe_state();
        while *states.borrow_and_update() != ConnectionState::Connecting {
            states.changed().await.unwrap();
        }

        let second = ctl.join(&endpoint()).await;

        assert_eq!(
            second,
            Err(SessionError::invalid_transition(
                Operation::Join,
                ConnectionState::Connecting
            ))
        );
        ctl.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_notifies_once() {
        let tcp = Arc::new(MockTransport::lan("tcp"));
        let ctl = controller(vec![tcp.clone()]);
        let observer = Arc::new(RecordingObserver::default());
        ctl.add_observer(observer.clone());
        ctl.host(request(SessionMode::LocalNetwork)).await.unwrap();

        ctl.stop().await;
        ctl.stop().await;

        assert_eq!(ctl.state(), ConnectionState::Idle);
        assert_eq!(tcp.shutdowns(), 1);
        assert_eq!(
            observer.events(),
            vec!["started:local-network", "ended:hosting"]
        );
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let tcp = Arc::new(MockTransport::lan("tcp"));
        let ctl = controller(vec![tcp.clone()]);
        ctl.stop().await;
        assert_eq!(tcp.shutdowns(), 0);
        assert_eq!(ctl.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_transport_lost_ends_session_with_notification() {
        let ctl = controller(vec![Arc::new(MockTransport::lan("tcp"))]);
        let observer = Arc::new(RecordingObserver::default());
        ctl.add_observer(observer.clone());
        ctl.join(&endpoint()).await.unwrap();

        ctl.report_transport_lost().await;

        assert_eq!(ctl.state(), ConnectionState::Idle);
        assert_eq!(observer.events(), vec!["ended:connected"]);
    }

    #[tokio::test]
    async fn test_host_after_stop_succeeds_again() {
        let ctl = controller(vec![Arc::new(MockTransport::lan("tcp"))]);
        ctl.host(request(SessionMode::LocalNetwork)).await.unwrap();
        ctl.stop().await;

        assert!(ctl.host(request(SessionMode::LocalNetwork)).await.is_ok());
    }

    #[tokio::test]
    async fn test_stop_while_listening_shuts_down_late_listener() {
        // Arrange
        let gate = Arc::new(Notify::new());
        let tcp = Arc::new(MockTransport::lan("tcp").with_listen_gate(gate.clone()));
        let ctl = Arc::new(controller(vec![tcp.clone()]));
        let hosting = tokio::spawn({
            let ctl = Arc::clone(&ctl);
            async move { ctl.host(request(SessionMode::LocalNetwork)).await }
        });
        let mut states = ctl.subscribe_state();
        while *states.borrow_and_update() != ConnectionState::Hosting {
            states.changed().await.unwrap();
        }

        // Act: stop before the listener exists, then let it bind.
        ctl.stop().await;
        gate.notify_one();
        let result = hosting.await.unwrap();

        // Assert
        assert_eq!(result, Err(SessionError::Cancelled));
        assert_eq!(ctl.state(), ConnectionState::Idle);
        assert!(!tcp.is_listening());
    }

    #[tokio::test]
    async fn test_superseded_host_leaves_newer_lobby_alone() {
        // Arrange
        let ctl = Arc::new(controller(vec![Arc::new(MockTransport::lobby("relay"))]));
        let gate = Arc::new(GateObserver::default());
        ctl.add_observer(gate.clone());
        let service = Arc::new(InMemoryLobbyService::new());
        let dyn_service: Arc<dyn LobbyService> = service.clone();
        let lobby = Arc::new(LobbyDiscovery::new(
            Some(dyn_service),
            HandshakeTag::from_app_name("rally"),
            "host-token",
        ));
        let manager = Arc::new(LobbyLifecycleManager::new(lobby));
        ctl.add_observer(manager.clone());

        let first = tokio::spawn({
            let ctl = Arc::clone(&ctl);
            async move { ctl.host(request(SessionMode::LobbyService)).await }
        });
        gate.entered.notified().await;
        ctl.stop().await;
        let mut second = request(SessionMode::LobbyService);
        second.display_name = "attic".to_string();
        ctl.host(second).await.unwrap();
        assert_eq!(service.lobby_count(), 1);

        // Act: the first attempt resumes after the second is hosting.
        gate.release.notify_one();
        let stale = first.await.unwrap();

        // Assert
        assert_eq!(stale, Err(SessionError::Cancelled));
        assert_eq!(ctl.state(), ConnectionState::Hosting);
        assert_eq!(service.lobby_count(), 1);
        let handle = manager.lobby_handle().await;
        assert!(handle.valid);
        let metadata = service.metadata(handle.id.unwrap()).unwrap();
        assert_eq!(metadata.get(META_NAME).map(String::as_str), Some("attic"));
    }
}
