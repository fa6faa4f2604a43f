//! Binds the external lobby advertisement to the host lifecycle.
//!
//! When the controller starts hosting in lobby-service mode, the manager asks
//! the lobby adapter to create (or refresh) the host's lobby. When the session
//! ends after hosting, it destroys that lobby exactly once, whether the end
//! came from `stop()` or from a lost transport.
//!
//! Teardown is driven by the controller's explicit session-ended callback.
//! [`LobbyLifecycleManager::watch_state`] adds a polling fallback for hosts
//! that cannot deliver callbacks: it watches the published connection state
//! and tears down on any `Hosting → Idle` change it observes, unless a new
//! session has claimed the state by then. Both paths share one ownership
//! record, so running both never destroys a lobby twice.
//!
//! Ownership is tagged with the hosting attempt that created the lobby. An
//! end notification for any other attempt is ignored, so a late callback
//! from a superseded `host()` cannot tear down a newer session's lobby.

use std::sync::Arc;

use async_trait::async_trait;
use rally_core::{ConnectionState, SessionMode};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::connection_lifecycle::{HostedSession, SessionObserver};
use crate::infrastructure::lobby::{LobbyDiscovery, LobbyHandle};

pub struct LobbyLifecycleManager {
    lobby: Arc<LobbyDiscovery>,
    /// The hosting attempt that owns the lobby, if any.
    owned: Mutex<Option<u64>>,
}

impl LobbyLifecycleManager {
    pub fn new(lobby: Arc<LobbyDiscovery>) -> Self {
        Self {
            lobby,
            owned: Mutex::new(None),
        }
    }

    pub async fn lobby_handle(&self) -> LobbyHandle {
        self.lobby.lobby_handle().await
    }

    pub async fn owns_lobby(&self) -> bool {
        self.owned.lock().await.is_some()
    }

    /// Destroys the owned lobby, if any. Safe to call any number of times.
    pub async fn teardown(&self) {
        let mut owned = self.owned.lock().await;
        self.release(&mut owned).await;
    }

    async fn release(&self, owned: &mut Option<u64>) {
        if owned.take().is_none() {
            debug!("no lobby owned; nothing to tear down");
            return;
        }
        self.lobby.destroy_lobby().await;
        info!("lobby torn down after hosting ended");
    }

    /// Teardown from the state watch. Skipped once the state has left `Idle`
    /// again: the new session reuses the lobby in place.
    async fn teardown_while_idle(&self, states: &watch::Receiver<ConnectionState>) {
        let mut owned = self.owned.lock().await;
        let state = *states.borrow();
        if state != ConnectionState::Idle {
            debug!("state is {state} again; keeping the lobby");
            return;
        }
        self.release(&mut owned).await;
    }

    /// Polling fallback: tears down on every observed `Hosting → Idle`
    /// change of `states`. Runs until the sender is dropped.
    pub fn watch_state(
        self: &Arc<Self>,
        mut states: watch::Receiver<ConnectionState>,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut last = *states.borrow_and_update();
            while states.changed().await.is_ok() {
                let now = *states.borrow_and_update();
                if last == ConnectionState::Hosting && now == ConnectionState::Idle {
                    debug!("state watch observed hosting end");
                    manager.teardown_while_idle(&states).await;
                }
                last = now;
            }
        })
    }
}

#[async_trait]
impl SessionObserver for LobbyLifecycleManager {
    async fn on_hosting_started(&self, session: &HostedSession) {
        if session.mode != SessionMode::LobbyService {
            return;
        }
        let mut owned = self.owned.lock().await;
        let advertised = self
            .lobby
            .create_or_update_lobby(&session.display_name, session.capacity, session.visibility)
            .await;
        // A lobby may exist even if some metadata failed to apply.
        if advertised || self.lobby.lobby_handle().await.valid {
            *owned = Some(session.attempt);
        } else {
            *owned = None;
            info!("hosting without a lobby advertisement");
        }
    }

    async fn on_session_ended(&self, previous: ConnectionState, attempt: u64) {
        if previous != ConnectionState::Hosting {
            return;
        }
        let mut owned = self.owned.lock().await;
        let owner = *owned;
        match owner {
            Some(owner) if owner == attempt => self.release(&mut owned).await,
            Some(owner) => debug!("lobby belongs to attempt {owner}, not {attempt}; keeping it"),
            None => debug!("no lobby owned; nothing to tear down"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::lobby::memory::InMemoryLobbyService;
    use crate::infrastructure::lobby::{LobbyService, LobbyVisibility};
    use crate::infrastructure::transport::mock::MockTransport;
    use rally_core::HandshakeTag;
    use std::time::Duration;

    fn setup() -> (Arc<InMemoryLobbyService>, Arc<LobbyLifecycleManager>) {
        let service = Arc::new(InMemoryLobbyService::new());
        let dyn_service: Arc<dyn LobbyService> = service.clone();
        let lobby = Arc::new(LobbyDiscovery::new(
            Some(dyn_service),
            HandshakeTag::from_app_name("rally"),
            "host-token",
        ));
        (service, Arc::new(LobbyLifecycleManager::new(lobby)))
    }

    fn hosted(mode: SessionMode) -> HostedSession {
        hosted_attempt(mode, 1)
    }

    fn hosted_attempt(mode: SessionMode, attempt: u64) -> HostedSession {
        HostedSession {
            mode,
            display_name: "den".to_string(),
            capacity: 4,
            visibility: LobbyVisibility::Public,
            backend: Arc::new(MockTransport::lobby("relay")),
            attempt,
        }
    }

    #[tokio::test]
    async fn test_lobby_created_only_for_lobby_mode() {
        let (service, manager) = setup();

        manager.on_hosting_started(&hosted(SessionMode::LocalNetwork)).await;
        assert_eq!(service.lobby_count(), 0);

        manager.on_hosting_started(&hosted(SessionMode::LobbyService)).await;
        assert_eq!(service.lobby_count(), 1);
        assert!(manager.owns_lobby().await);
        assert!(manager.lobby_handle().await.valid);
    }

    #[tokio::test]
    async fn test_session_end_after_hosting_destroys_lobby() {
        // Arrange
        let (service, manager) = setup();
        manager.on_hosting_started(&hosted(SessionMode::LobbyService)).await;

        // Act
        manager.on_session_ended(ConnectionState::Hosting, 1).await;

        // Assert
        assert_eq!(service.lobby_count(), 0);
        assert!(!manager.lobby_handle().await.valid);
    }

    #[tokio::test]
    async fn test_session_end_from_connected_leaves_lobby_alone() {
        let (service, manager) = setup();
        manager.on_hosting_started(&hosted(SessionMode::LobbyService)).await;

        manager.on_session_ended(ConnectionState::Connected, 1).await;

        assert_eq!(service.lobby_count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_service_hosts_without_lobby() {
        let (service, manager) = setup();
        service.set_available(false);

        manager.on_hosting_started(&hosted(SessionMode::LobbyService)).await;

        assert!(!manager.owns_lobby().await);
        manager.on_session_ended(ConnectionState::Hosting, 1).await;
    }

    #[tokio::test]
    async fn test_state_watch_tears_down_once_alongside_callback() {
        // Arrange
        let (service, manager) = setup();
        let (tx, rx) = watch::channel(ConnectionState::Idle);
        let watcher = manager.watch_state(rx);
        tx.send_replace(ConnectionState::Hosting);
        manager.on_hosting_started(&hosted(SessionMode::LobbyService)).await;
        tokio::task::yield_now().await;

        // Act: the state change is seen by the watcher, and the explicit
        // callback also fires.
        tx.send_replace(ConnectionState::Idle);
        manager.on_session_ended(ConnectionState::Hosting, 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Assert
        assert_eq!(service.lobby_count(), 0);
        assert!(!manager.owns_lobby().await);
        watcher.abort();
    }

    #[tokio::test]
    async fn test_state_watch_alone_detects_abnormal_end() {
        let (service, manager) = setup();
        let (tx, rx) = watch::channel(ConnectionState::Hosting);
        manager.on_hosting_started(&hosted(SessionMode::LobbyService)).await;
        let watcher = manager.watch_state(rx);
        tokio::task::yield_now().await;

        tx.send_replace(ConnectionState::Idle);
        for _ in 0..50 {
            if service.lobby_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(service.lobby_count(), 0);
        watcher.abort();
    }

    #[tokio::test]
    async fn test_end_of_older_attempt_keeps_newer_lobby() {
        // Arrange: attempt 1 ended without a lobby, attempt 3 now owns one.
        let (service, manager) = setup();
        manager
            .on_hosting_started(&hosted_attempt(SessionMode::LobbyService, 3))
            .await;

        // Act
        manager.on_session_ended(ConnectionState::Hosting, 1).await;

        // Assert
        assert_eq!(service.lobby_count(), 1);
        assert!(manager.owns_lobby().await);

        manager.on_session_ended(ConnectionState::Hosting, 3).await;
        assert_eq!(service.lobby_count(), 0);
    }

    #[tokio::test]
    async fn test_state_watch_keeps_lobby_when_hosting_resumed() {
        // Arrange
        let (service, manager) = setup();
        let (tx, rx) = watch::channel(ConnectionState::Hosting);
        manager.on_hosting_started(&hosted(SessionMode::LobbyService)).await;

        // Act: the teardown only runs after a new session claimed the state.
        tx.send_replace(ConnectionState::Idle);
        tx.send_replace(ConnectionState::Hosting);
        manager.teardown_while_idle(&rx).await;

        // Assert
        assert_eq!(service.lobby_count(), 1);
        assert!(manager.owns_lobby().await);
    }
}
