//! Lobby-service discovery adapter.
//!
//! An external lobby directory (a platform matchmaking service, a relay, or
//! the in-process directory in [`memory`]) lists advertised sessions. This
//! module wraps that directory in two directions:
//!
//! - **Browsing** – [`LobbyDiscovery::query_lobbies`] asks for the full list of
//!   lobbies tagged with the local handshake and turns it into a
//!   [`LobbyListing`]: one discovery event per lobby plus the ids that were in
//!   the previous listing but are gone now.
//! - **Hosting** – [`LobbyDiscovery::create_or_update_lobby`] and
//!   [`LobbyDiscovery::destroy_lobby`] manage the single lobby the local host
//!   owns.
//!
//! The lobby service is always optional. Every operation here degrades to
//! `None`/`false` plus a warning when the service is missing, unavailable, or
//! returns an error; nothing propagates to the caller as a failure.
//!
//! # Overlapping queries
//!
//! Queries are fire-and-forget, so a new one can start before the previous one
//! has answered. Each query takes a generation number when issued. When it
//! completes, its result is applied only if no newer query has already been
//! applied; an older answer arriving late is dropped whole rather than merged
//! with the newer listing's removals.

pub mod memory;

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rally_core::{
    ConnectDescriptor, DiscoveryEvent, DiscoverySource, HandshakeTag, SessionError, SessionId,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Metadata key holding the decimal handshake tag.
pub const META_HANDSHAKE: &str = "handshake";
/// Metadata key holding the host's display name.
pub const META_NAME: &str = "name";
/// Metadata key holding the reverse-connect token for the host.
pub const META_HOST: &str = "host";

/// External identity of a lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LobbyId(pub u64);

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who may see a created lobby.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LobbyVisibility {
    /// Restricted to the host's contacts.
    #[default]
    FriendsOnly,
    Public,
}

/// One lobby as returned by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyEntry {
    pub id: LobbyId,
    pub metadata: BTreeMap<String, String>,
}

impl LobbyEntry {
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Errors reported by a [`LobbyService`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LobbyServiceError {
    #[error("lobby service is not available")]
    Unavailable,
    #[error("lobby creation rejected: {0}")]
    CreateRejected(String),
    #[error("lobby query failed: {0}")]
    Query(String),
    #[error("lobby {0} does not exist")]
    NotFound(LobbyId),
}

/// Capability interface to an external lobby directory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LobbyService: Send + Sync {
    /// `true` when the service is running and reachable.
    fn is_available(&self) -> bool;

    async fn create_lobby(
        &self,
        visibility: LobbyVisibility,
        capacity: u32,
    ) -> Result<LobbyId, LobbyServiceError>;

    async fn set_lobby_data(
        &self,
        lobby: LobbyId,
        key: &str,
        value: &str,
    ) -> Result<(), LobbyServiceError>;

    /// Full listing of lobbies whose handshake metadata equals `handshake`.
    async fn request_lobby_list(
        &self,
        handshake: HandshakeTag,
    ) -> Result<Vec<LobbyEntry>, LobbyServiceError>;

    async fn leave_lobby(&self, lobby: LobbyId);
}

/// The local host's advertised lobby.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LobbyHandle {
    /// The most recently owned lobby, kept after teardown.
    pub id: Option<LobbyId>,
    pub valid: bool,
}

/// Result of one completed, non-stale lobby query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyListing {
    pub generation: u64,
    pub sessions: Vec<DiscoveryEvent>,
    /// Ids present in the previously applied listing but absent from this one.
    pub removed: Vec<SessionId>,
}

#[derive(Default)]
struct ListingState {
    applied: u64,
    known: HashSet<SessionId>,
}

/// Lobby-service discovery adapter and owner of the local host's lobby.
pub struct LobbyDiscovery {
    service: Option<Arc<dyn LobbyService>>,
    handshake: HandshakeTag,
    host_token: String,
    issued: AtomicU64,
    listing: Mutex<ListingState>,
    owned: tokio::sync::Mutex<LobbyHandle>,
}

impl LobbyDiscovery {
    /// `host_token` is stored in the lobby metadata so joiners can connect
    /// back to this host.
    pub fn new(
        service: Option<Arc<dyn LobbyService>>,
        handshake: HandshakeTag,
        host_token: impl Into<String>,
    ) -> Self {
        Self {
            service,
            handshake,
            host_token: host_token.into(),
            issued: AtomicU64::new(0),
            listing: Mutex::new(ListingState::default()),
            owned: tokio::sync::Mutex::new(LobbyHandle::default()),
        }
    }

    /// An adapter with no lobby service behind it; every call is a no-op.
    pub fn disabled(handshake: HandshakeTag) -> Self {
        Self::new(None, handshake, String::new())
    }

    pub fn handshake(&self) -> HandshakeTag {
        self.handshake
    }

    pub fn host_token(&self) -> &str {
        &self.host_token
    }

    /// Returns the service when it is configured and currently available.
    fn available_service(&self) -> Option<&Arc<dyn LobbyService>> {
        match &self.service {
            Some(service) if service.is_available() => Some(service),
            Some(_) => {
                warn!(
                    "{}",
                    SessionError::LobbyServiceUnavailable(LobbyServiceError::Unavailable.to_string())
                );
                None
            }
            None => None,
        }
    }

    /// Issues one full-listing query and returns the resulting listing.
    ///
    /// Returns `None` if the service is unavailable, the query failed, or a
    /// newer query was applied while this one was in flight.
    pub async fn query_lobbies(&self) -> Option<LobbyListing> {
        let mut result = None;
        self.query_lobbies_with(|listing| result = Some(listing.clone()))
            .await;
        result
    }

    /// Like [`query_lobbies`](Self::query_lobbies), but hands the listing to
    /// `apply` while the generation check still holds, so listings reach the
    /// caller in generation order.
    ///
    /// Returns `true` if `apply` was called.
    pub async fn query_lobbies_with<F>(&self, apply: F) -> bool
    where
        F: FnOnce(&LobbyListing),
    {
        let Some(service) = self.available_service() else {
            return false;
        };
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("lobby query #{generation} issued");

        let entries = match service.request_lobby_list(self.handshake).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("lobby query #{generation} failed: {e}");
                return false;
            }
        };

        let mut state = self.listing.lock().unwrap_or_else(PoisonError::into_inner);
        if generation <= state.applied {
            debug!(
                "lobby query #{generation} discarded; #{} already applied",
                state.applied
            );
            return false;
        }

        let sessions: Vec<DiscoveryEvent> = entries
            .iter()
            .filter(|entry| self.matches_handshake(entry))
            .map(|entry| self.entry_to_event(entry))
            .collect();
        let current: HashSet<SessionId> = sessions.iter().map(|event| event.id).collect();
        let mut removed: Vec<SessionId> = state.known.difference(&current).copied().collect();
        removed.sort_unstable();

        let listing = LobbyListing {
            generation,
            sessions,
            removed,
        };
        debug!(
            "lobby query #{generation}: {} lobbies, {} removed",
            listing.sessions.len(),
            listing.removed.len()
        );
        apply(&listing);

        state.applied = generation;
        state.known = current;
        true
    }

    fn matches_handshake(&self, entry: &LobbyEntry) -> bool {
        let matches = entry
            .meta(META_HANDSHAKE)
            .and_then(HandshakeTag::parse)
            .is_some_and(|tag| tag == self.handshake);
        if !matches {
            debug!("ignoring lobby {} with foreign handshake", entry.id);
        }
        matches
    }

    fn entry_to_event(&self, entry: &LobbyEntry) -> DiscoveryEvent {
        let token = entry
            .meta(META_HOST)
            .filter(|host| !host.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| entry.id.to_string());
        DiscoveryEvent {
            source: DiscoverySource::LobbyService,
            id: entry.id.0,
            display_name: entry
                .meta(META_NAME)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            descriptor: ConnectDescriptor::LobbyToken(token),
        }
    }

    /// Creates the host's lobby, or refreshes its metadata if one is
    /// already owned.
    ///
    /// Returns `true` when the lobby exists and carries the current metadata.
    pub async fn create_or_update_lobby(
        &self,
        display_name: &str,
        capacity: u32,
        visibility: LobbyVisibility,
    ) -> bool {
        let Some(service) = self.available_service() else {
            return false;
        };

        let mut owned = self.owned.lock().await;
        let lobby = match owned.id.filter(|_| owned.valid) {
            Some(lobby) => {
                debug!("updating owned lobby {lobby}");
                lobby
            }
            None => match service.create_lobby(visibility, capacity).await {
                Ok(lobby) => {
                    info!("created lobby {lobby} (capacity {capacity}, {visibility:?})");
                    *owned = LobbyHandle {
                        id: Some(lobby),
                        valid: true,
                    };
                    lobby
                }
                Err(e) => {
                    warn!("{}", SessionError::LobbyServiceUnavailable(e.to_string()));
                    return false;
                }
            },
        };

        let handshake = self.handshake.to_string();
        let metadata = [
            (META_HANDSHAKE, handshake.as_str()),
            (META_NAME, display_name),
            (META_HOST, self.host_token.as_str()),
        ];
        let mut complete = true;
        for (key, value) in metadata {
            if let Err(e) = service.set_lobby_data(lobby, key, value).await {
                warn!("could not set lobby {lobby} metadata {key}: {e}");
                complete = false;
            }
        }
        complete
    }

    /// Leaves the owned lobby. A no-op returning `true` when none is owned.
    pub async fn destroy_lobby(&self) -> bool {
        let mut owned = self.owned.lock().await;
        let Some(lobby) = owned.id.filter(|_| owned.valid) else {
            return true;
        };
        owned.valid = false;

        match &self.service {
            Some(service) => {
                service.leave_lobby(lobby).await;
                info!("left lobby {lobby}");
            }
            None => warn!("lobby {lobby} owned without a lobby service"),
        }
        true
    }

    pub async fn lobby_handle(&self) -> LobbyHandle {
        *self.owned.lock().await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
