//! `SessionNode`: the explicitly owned context object.
//!
//! One `SessionNode` holds everything a process needs to find, host and join
//! sessions: the connection controller with its transport arbitrator, both
//! discovery adapters, the session registry, and the lifecycle observers that
//! advertise a hosted session. Nothing is global, so several nodes can run in
//! one process (the integration tests rely on that).
//!
//! # Exposed surface
//!
//! | Operation      | Effect                                                  |
//! |----------------|---------------------------------------------------------|
//! | `host`         | Start hosting in the given mode                         |
//! | `join`         | Connect to a discovered session                         |
//! | `stop`         | End the current session (idempotent)                    |
//! | `refresh`      | One discovery cycle on both sources                     |
//! | `snapshot`     | Read-only view of the live discovered sessions          |
//!
//! Build one with [`SessionNodeBuilder`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rally_core::{
    ConnectDescriptor, ConnectionState, HandshakeTag, SessionError, SessionMode, SessionRecord,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use super::connection_lifecycle::{ConnectionController, HostRequest};
use super::discover_sessions::{DiscoveryService, RefreshOutcome};
use super::lobby_lifecycle::LobbyLifecycleManager;
use super::session_registry::SharedSessionRegistry;
use super::transport_arbitrator::TransportArbitrator;
use crate::infrastructure::lobby::{LobbyDiscovery, LobbyHandle, LobbyService};
use crate::infrastructure::network::broadcast::{BroadcastConfig, BroadcastDiscovery};
use crate::infrastructure::network::interfaces::{InterfaceSource, SystemInterfaces};
use crate::infrastructure::network::responder::LanAdvertiser;
use crate::infrastructure::storage::config::{ConfigError, NodeSettings};
use crate::infrastructure::transport::TransportBackend;

/// Assembles a [`SessionNode`] from settings and capabilities.
pub struct SessionNodeBuilder {
    settings: NodeSettings,
    backends: Vec<Arc<dyn TransportBackend>>,
    lobby_service: Option<Arc<dyn LobbyService>>,
    interfaces: Arc<dyn InterfaceSource>,
    host_token: Option<String>,
}

impl SessionNodeBuilder {
    pub fn new(settings: NodeSettings) -> Self {
        Self {
            settings,
            backends: Vec::new(),
            lobby_service: None,
            interfaces: Arc::new(SystemInterfaces),
            host_token: None,
        }
    }

    /// Registers a transport backend with the arbitrator.
    pub fn backend(mut self, backend: Arc<dyn TransportBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn lobby_service(mut self, service: Arc<dyn LobbyService>) -> Self {
        self.lobby_service = Some(service);
        self
    }

    /// Replaces OS interface enumeration, e.g. with a fixed list.
    pub fn interfaces(mut self, interfaces: Arc<dyn InterfaceSource>) -> Self {
        self.interfaces = interfaces;
        self
    }

    /// Token joiners use to reach this host through the lobby service.
    /// Defaults to a random UUID.
    pub fn host_token(mut self, token: impl Into<String>) -> Self {
        self.host_token = Some(token.into());
        self
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the settings fail validation.
    pub fn build(self) -> Result<SessionNode, ConfigError> {
        self.settings.validate()?;
        let settings = self.settings;
        let handshake = HandshakeTag::from_app_name(&settings.node.app_name);

        let mut arbitrator = TransportArbitrator::new(
            settings.transport.preference.clone(),
            settings.transport.fallback.clone(),
        );
        for backend in self.backends {
            arbitrator.register(backend);
        }
        let controller = Arc::new(ConnectionController::new(arbitrator));
        controller.set_player_template(settings.node.player_template);

        let host_token = self
            .host_token
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let lobby = Arc::new(LobbyDiscovery::new(
            self.lobby_service,
            handshake,
            host_token,
        ));
        let lobby_lifecycle = Arc::new(LobbyLifecycleManager::new(Arc::clone(&lobby)));
        controller.add_observer(lobby_lifecycle.clone());
        controller.add_observer(Arc::new(LanAdvertiser::new(
            settings.discovery.port,
            handshake,
        )));

        let broadcast = settings.discovery.enabled.then(|| {
            Arc::new(BroadcastDiscovery::new(
                BroadcastConfig::new(settings.discovery.port, handshake),
                self.interfaces,
            ))
        });
        let discovery = DiscoveryService::new(SharedSessionRegistry::new(), broadcast, lobby);

        info!(
            "node ready (app {:?}, handshake {handshake})",
            settings.node.app_name
        );
        Ok(SessionNode {
            settings,
            handshake,
            controller,
            discovery,
            lobby_lifecycle,
            tasks: Mutex::new(BackgroundTasks::default()),
        })
    }
}

#[derive(Default)]
struct BackgroundTasks {
    pruner: Option<JoinHandle<()>>,
    state_watch: Option<JoinHandle<()>>,
}

/// A process's session discovery, hosting and joining context.
pub struct SessionNode {
    settings: NodeSettings,
    handshake: HandshakeTag,
    controller: Arc<ConnectionController>,
    discovery: DiscoveryService,
    lobby_lifecycle: Arc<LobbyLifecycleManager>,
    tasks: Mutex<BackgroundTasks>,
}

impl SessionNode {
    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    pub fn handshake(&self) -> HandshakeTag {
        self.handshake
    }

    pub fn controller(&self) -> &Arc<ConnectionController> {
        &self.controller
    }

    pub fn registry(&self) -> &SharedSessionRegistry {
        self.discovery.registry()
    }

    pub fn state(&self) -> ConnectionState {
        self.controller.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.controller.subscribe_state()
    }

    /// Hosts using the configured display name, capacity and visibility.
    ///
    /// # Errors
    ///
    /// See [`ConnectionController::host`].
    pub async fn host(&self, mode: SessionMode) -> Result<(), SessionError> {
        self.controller
            .host(HostRequest {
                mode,
                display_name: self.settings.node.display_name.clone(),
                capacity: self.settings.lobby.capacity,
                visibility: self.settings.lobby.visibility,
            })
            .await
    }

    /// # Errors
    ///
    /// See [`ConnectionController::host`].
    pub async fn host_with(&self, request: HostRequest) -> Result<(), SessionError> {
        self.controller.host(request).await
    }

    /// # Errors
    ///
    /// See [`ConnectionController::join`].
    pub async fn join(&self, target: &ConnectDescriptor) -> Result<(), SessionError> {
        self.controller.join(target).await
    }

    /// Joins a session taken from [`snapshot`](Self::snapshot).
    ///
    /// # Errors
    ///
    /// See [`ConnectionController::join`].
    pub async fn join_session(&self, session: &SessionRecord) -> Result<(), SessionError> {
        self.controller.join(&session.descriptor).await
    }

    pub async fn stop(&self) {
        self.controller.stop().await;
    }

    /// Starts LAN discovery on a broadcast-capable backend and the prune
    /// ticker. Returns whether LAN discovery is listening; lobby discovery
    /// through [`refresh`](Self::refresh) works either way.
    pub async fn start_browsing(&self) -> bool {
        let listening = self
            .discovery
            .start(self.controller.broadcast_backend())
            .await;

        let d = &self.settings.discovery;
        let pruner = self
            .registry()
            .spawn_pruner(d.prune_interval(), d.stale_timeout());
        if let Some(previous) = self.lock_tasks().pruner.replace(pruner) {
            previous.abort();
        }
        listening
    }

    pub fn stop_browsing(&self) {
        self.discovery.stop();
        if let Some(pruner) = self.lock_tasks().pruner.take() {
            pruner.abort();
        }
    }

    /// Enables the polling fallback that tears down the owned lobby when the
    /// controller is seen leaving `Hosting` for `Idle`.
    pub fn watch_for_abnormal_end(&self) {
        let watcher = self
            .lobby_lifecycle
            .watch_state(self.controller.subscribe_state());
        if let Some(previous) = self.lock_tasks().state_watch.replace(watcher) {
            previous.abort();
        }
    }

    /// Triggers one discovery cycle on both sources.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.discovery.refresh().await
    }

    /// Live discovered sessions, in first-discovery order.
    pub fn snapshot(&self) -> Vec<SessionRecord> {
        self.registry().snapshot()
    }

    pub async fn lobby_handle(&self) -> LobbyHandle {
        self.lobby_lifecycle.lobby_handle().await
    }

    fn lock_tasks(&self) -> MutexGuard<'_, BackgroundTasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionNode {
    fn drop(&mut self) {
        let tasks = self.lock_tasks();
        for task in [&tasks.pruner, &tasks.state_watch].into_iter().flatten() {
            task.abort();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
