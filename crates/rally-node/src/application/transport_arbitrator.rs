//! Transport arbitration: which backend carries the session.
//!
//! Optional transport backends register themselves with the
//! [`TransportArbitrator`] at startup, each advertising its capabilities
//! through the [`TransportBackend`] trait. A backend that is not compiled in or
//! not wanted is simply never registered; nothing is looked up by type name.
//!
//! # Selection rules
//!
//! | Mode             | Candidates, in order                                               |
//! |------------------|--------------------------------------------------------------------|
//! | `LobbyService`   | the active backend, then any backend accepting lobby connect tokens |
//! | `LocalNetwork`   | the active backend, then the preference list, then the fallback     |
//!
//! Unavailable backends are skipped. Lobby-service mode never falls back to a
//! plain `address:port` backend: the two descriptor families are not
//! interchangeable. If no candidate activates, the result is
//! [`SessionError::TransportUnavailable`].
//!
//! Arbitration only runs while the connection is idle, and at most one backend
//! is active at a time. Selecting the already-active backend does nothing.

use std::sync::Arc;

use rally_core::{ConnectionState, Operation, SessionError, SessionMode};
use tracing::{debug, info, warn};

use crate::infrastructure::transport::TransportBackend;

/// Registry of transport backends and owner of the "active" slot.
#[derive(Default)]
pub struct TransportArbitrator {
    backends: Vec<Arc<dyn TransportBackend>>,
    preference: Vec<String>,
    fallback: Option<String>,
    active: Option<usize>,
}

impl TransportArbitrator {
    /// `preference` lists backend names tried for local-network sessions;
    /// `fallback` names the backend used when none of them resolves.
    pub fn new(preference: Vec<String>, fallback: Option<String>) -> Self {
        Self {
            backends: Vec::new(),
            preference,
            fallback,
            active: None,
        }
    }

    /// Registers `backend`, replacing an earlier registration with the same
    /// name.
    pub fn register(&mut self, backend: Arc<dyn TransportBackend>) {
        info!(
            "transport {} registered (broadcast={}, lobby-token={}, endpoint={})",
            backend.name(),
            backend.supports_broadcast(),
            backend.supports_lobby_connect_token(),
            backend.supports_endpoint()
        );
        match self.position(backend.name()) {
            Some(index) => {
                if self.active == Some(index) {
                    self.backends[index].deactivate();
                    self.active = None;
                }
                self.backends[index] = backend;
            }
            None => self.backends.push(backend),
        }
    }

    /// Names of all registered backends, in registration order.
    pub fn backend_names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    /// The currently active backend, if any.
    pub fn active(&self) -> Option<Arc<dyn TransportBackend>> {
        self.active.map(|index| Arc::clone(&self.backends[index]))
    }

    /// A registered backend able to broadcast, preferring the active one.
    ///
    /// Used by browsing, which does not change the active slot.
    pub fn broadcast_capable(&self) -> Option<Arc<dyn TransportBackend>> {
        self.active
            .into_iter()
            .chain(0..self.backends.len())
            .map(|index| &self.backends[index])
            .find(|b| b.is_available() && b.supports_broadcast())
            .cloned()
    }

    /// Selects a backend for `mode` and makes it the single active one.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidStateTransition`] unless `state` is `Idle`.
    /// - [`SessionError::TransportUnavailable`] if no candidate activates.
    pub fn select_and_activate(
        &mut self,
        mode: SessionMode,
        state: ConnectionState,
    ) -> Result<Arc<dyn TransportBackend>, SessionError> {
        if state != ConnectionState::Idle {
            return Err(SessionError::invalid_transition(
                Operation::SelectTransport,
                state,
            ));
        }

        for index in self.candidates(mode) {
            if self.active == Some(index) {
                debug!("transport {} already active", self.backends[index].name());
                return Ok(Arc::clone(&self.backends[index]));
            }

            let backend = Arc::clone(&self.backends[index]);
            match backend.activate() {
                Ok(()) => {
                    if let Some(previous) = self.active.replace(index) {
                        self.backends[previous].deactivate();
                    }
                    info!("transport {} active for {mode} mode", backend.name());
                    return Ok(backend);
                }
                Err(e) => warn!("transport {} failed to activate: {e}", backend.name()),
            }
        }

        Err(SessionError::TransportUnavailable { mode })
    }

    /// Backend indices to try for `mode`, best first, without duplicates.
    fn candidates(&self, mode: SessionMode) -> Vec<usize> {
        let mut order: Vec<usize> = self.active.into_iter().collect();
        match mode {
            SessionMode::LobbyService => order.extend(0..self.backends.len()),
            SessionMode::LocalNetwork => {
                order.extend(self.preference.iter().filter_map(|name| self.position(name)));
                order.extend(self.fallback.as_deref().and_then(|name| self.position(name)));
            }
        }

        let mut candidates = Vec::with_capacity(order.len());
        for index in order {
            if self.fits(index, mode) && !candidates.contains(&index) {
                candidates.push(index);
            }
        }
        candidates
    }

    fn fits(&self, index: usize, mode: SessionMode) -> bool {
        let backend = &self.backends[index];
        backend.is_available()
            && match mode {
                SessionMode::LobbyService => backend.supports_lobby_connect_token(),
                SessionMode::LocalNetwork => backend.supports_endpoint(),
            }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.backends.iter().position(|b| b.name() == name)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
