//! Discovery orchestration: feeds both adapters into the session registry.
//!
//! [`DiscoveryService`] owns the wiring between the discovery adapters and the
//! [`SharedSessionRegistry`]:
//!
//! - `start` binds LAN discovery to a broadcast-capable backend and spawns a
//!   pump moving every broadcast discovery event into the registry.
//! - `refresh` runs one discovery cycle: a broadcast probe, plus a
//!   fire-and-forget lobby query whose listing is applied to the registry when
//!   it arrives.
//! - `stop` ends LAN discovery. Sessions already in the registry stay until
//!   they go stale.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::session_registry::SharedSessionRegistry;
use crate::infrastructure::lobby::LobbyDiscovery;
use crate::infrastructure::network::broadcast::{BroadcastDiscovery, ProbeReport};
use crate::infrastructure::transport::TransportBackend;

/// What one [`DiscoveryService::refresh`] call started.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub probe: ProbeReport,
    /// Resolves to `true` once the lobby listing was applied. Callers
    /// normally drop it.
    pub lobby_query: JoinHandle<bool>,
}

pub struct DiscoveryService {
    registry: SharedSessionRegistry,
    broadcast: Option<Arc<BroadcastDiscovery>>,
    lobby: Arc<LobbyDiscovery>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl DiscoveryService {
    /// `broadcast` is `None` when LAN discovery is disabled.
    pub fn new(
        registry: SharedSessionRegistry,
        broadcast: Option<Arc<BroadcastDiscovery>>,
        lobby: Arc<LobbyDiscovery>,
    ) -> Self {
        Self {
            registry,
            broadcast,
            lobby,
            pump: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &SharedSessionRegistry {
        &self.registry
    }

    pub fn is_listening(&self) -> bool {
        self.broadcast
            .as_ref()
            .is_some_and(|broadcast| broadcast.is_running())
    }

    /// Starts LAN discovery on `transport`.
    ///
    /// Returns `false` if LAN discovery is disabled, no backend was given, or
    /// the backend cannot broadcast.
    pub async fn start(&self, transport: Option<Arc<dyn TransportBackend>>) -> bool {
        let Some(broadcast) = &self.broadcast else {
            debug!("LAN discovery disabled");
            return false;
        };
        let Some(transport) = transport else {
            info!("no broadcast-capable transport registered; LAN discovery unavailable");
            return false;
        };
        let Some(mut events) = broadcast.start_discovery(transport.as_ref()).await else {
            return false;
        };

        let registry = self.registry.clone();
        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                registry.record_discovery(event);
            }
        });
        if let Some(previous) = self.lock_pump().replace(pump) {
            previous.abort();
        }
        true
    }

    /// Runs one discovery cycle on both sources.
    pub async fn refresh(&self) -> RefreshOutcome {
        let probe = match &self.broadcast {
            Some(broadcast) => broadcast.probe().await,
            None => ProbeReport::default(),
        };

        let lobby = Arc::clone(&self.lobby);
        let registry = self.registry.clone();
        let lobby_query = tokio::spawn(async move {
            lobby
                .query_lobbies_with(|listing| registry.apply_listing(listing))
                .await
        });

        RefreshOutcome { probe, lobby_query }
    }

    pub fn stop(&self) {
        if let Some(broadcast) = &self.broadcast {
            broadcast.stop_discovery();
        }
        if let Some(pump) = self.lock_pump().take() {
            pump.abort();
        }
    }

    fn lock_pump(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pump.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DiscoveryService {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
