//! In-process lobby directory.
//!
//! A [`LobbyService`] backed by a map in memory. Several nodes in one process
//! can share one `Arc<InMemoryLobbyService>` and see each other's lobbies,
//! which is what the `in-process` lobby backend in the configuration selects.
//! Availability and creation failures can be toggled at runtime so the
//! degrade-to-no-op paths can be exercised without a real service.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rally_core::HandshakeTag;
use tracing::debug;

use super::{LobbyEntry, LobbyId, LobbyService, LobbyServiceError, LobbyVisibility, META_HANDSHAKE};

#[derive(Debug, Clone)]
struct StoredLobby {
    visibility: LobbyVisibility,
    capacity: u32,
    metadata: BTreeMap<String, String>,
}

#[derive(Default)]
struct Directory {
    next_id: u64,
    lobbies: BTreeMap<LobbyId, StoredLobby>,
}

/// Lobby directory shared by every node in the process.
pub struct InMemoryLobbyService {
    directory: Mutex<Directory>,
    available: AtomicBool,
    reject_creates: AtomicBool,
    queries: AtomicUsize,
}

impl InMemoryLobbyService {
    pub fn new() -> Self {
        Self {
            directory: Mutex::new(Directory {
                next_id: 1,
                lobbies: BTreeMap::new(),
            }),
            available: AtomicBool::new(true),
            reject_creates: AtomicBool::new(false),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes subsequent `create_lobby` calls fail with `CreateRejected`.
    pub fn reject_creates(&self, reject: bool) {
        self.reject_creates.store(reject, Ordering::SeqCst);
    }

    /// Number of listing requests served.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn lobby_count(&self) -> usize {
        self.directory().lobbies.len()
    }

    /// Metadata of `lobby`, if it exists.
    pub fn metadata(&self, lobby: LobbyId) -> Option<BTreeMap<String, String>> {
        self.directory()
            .lobbies
            .get(&lobby)
            .map(|stored| stored.metadata.clone())
    }

    /// Visibility and capacity `lobby` was created with.
    pub fn settings(&self, lobby: LobbyId) -> Option<(LobbyVisibility, u32)> {
        self.directory()
            .lobbies
            .get(&lobby)
            .map(|stored| (stored.visibility, stored.capacity))
    }

    /// Removes a lobby as if its host vanished without leaving.
    pub fn remove(&self, lobby: LobbyId) -> bool {
        self.directory().lobbies.remove(&lobby).is_some()
    }

    fn directory(&self) -> MutexGuard<'_, Directory> {
        self.directory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_available(&self) -> Result<(), LobbyServiceError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(LobbyServiceError::Unavailable)
        }
    }
}

impl Default for InMemoryLobbyService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LobbyService for InMemoryLobbyService {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn create_lobby(
        &self,
        visibility: LobbyVisibility,
        capacity: u32,
    ) -> Result<LobbyId, LobbyServiceError> {
        self.ensure_available()?;
        if self.reject_creates.load(Ordering::SeqCst) {
            return Err(LobbyServiceError::CreateRejected(
                "directory refuses new lobbies".to_string(),
            ));
        }
        let mut directory = self.directory();
        let id = LobbyId(directory.next_id);
        directory.next_id += 1;
        directory.lobbies.insert(
            id,
            StoredLobby {
                visibility,
                capacity,
                metadata: BTreeMap::new(),
            },
        );
        debug!("in-process lobby {id} created");
        Ok(id)
    }

    async fn set_lobby_data(
        &self,
        lobby: LobbyId,
        key: &str,
        value: &str,
    ) -> Result<(), LobbyServiceError> {
        self.ensure_available()?;
        let mut directory = self.directory();
        let stored = directory
            .lobbies
            .get_mut(&lobby)
            .ok_or(LobbyServiceError::NotFound(lobby))?;
        stored.metadata.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn request_lobby_list(
        &self,
        handshake: HandshakeTag,
    ) -> Result<Vec<LobbyEntry>, LobbyServiceError> {
        self.ensure_available()?;
        self.queries.fetch_add(1, Ordering::SeqCst);
        let wanted = handshake.to_string();
        let directory = self.directory();
        Ok(directory
            .lobbies
            .iter()
            .filter(|(_, stored)| stored.metadata.get(META_HANDSHAKE) == Some(&wanted))
            .map(|(id, stored)| LobbyEntry {
                id: *id,
                metadata: stored.metadata.clone(),
            })
            .collect())
    }

    async fn leave_lobby(&self, lobby: LobbyId) {
        if self.directory().lobbies.remove(&lobby).is_some() {
            debug!("in-process lobby {lobby} removed");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
