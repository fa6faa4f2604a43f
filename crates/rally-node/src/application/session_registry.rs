//! Session registry: the merge point of both discovery sources.
//!
//! Broadcast responses and lobby listings arrive as [`DiscoveryEvent`]s on
//! independent paths. The registry folds them into one set of
//! [`SessionRecord`]s keyed by `(source, id)`:
//!
//! - A repeated event for the same key overwrites the record's fields and
//!   refreshes `last_seen`; it never creates a second entry.
//! - The same id from different sources yields two records, since each source
//!   numbers its sessions independently.
//! - A record disappears when a prune pass finds it older than the staleness
//!   timeout, or immediately when the lobby adapter reports it gone.
//!
//! The registry never invents records. Showing a placeholder when the list is
//! empty is the presentation layer's business.
//!
//! # Sharing
//!
//! [`SessionRegistry`] is a plain single-owner structure.
//! [`SharedSessionRegistry`] wraps it in an `Arc<Mutex<_>>` so the discovery
//! pumps, the prune ticker and the presentation layer can all use it. Every
//! operation takes the lock for a short, non-blocking critical section and the
//! lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rally_core::{DiscoveryEvent, DiscoverySource, SessionId, SessionKey, SessionRecord};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::infrastructure::lobby::LobbyListing;

struct Entry {
    /// Insertion order, kept across refreshes so snapshots stay stable.
    seq: u64,
    record: SessionRecord,
}

/// In-memory set of live discovered sessions.
#[derive(Default)]
pub struct SessionRegistry {
    entries: HashMap<SessionKey, Entry>,
    next_seq: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts the record for `event`'s key, stamped with `now`.
    pub fn record_discovery(&mut self, event: DiscoveryEvent, now: Instant) {
        let key = event.key();
        let record = SessionRecord::from_event(event, now);
        match self.entries.get_mut(&key) {
            Some(entry) => entry.record = record,
            None => {
                debug!("new session {key}");
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.insert(key, Entry { seq, record });
            }
        }
    }

    /// Removes a record immediately, regardless of its age.
    ///
    /// Returns `true` if a record was removed.
    pub fn remove_explicit(&mut self, source: DiscoverySource, id: SessionId) -> bool {
        let removed = self.entries.remove(&SessionKey::new(source, id)).is_some();
        if removed {
            debug!("session {source}:{id} removed explicitly");
        }
        removed
    }

    /// Removes every record with `now - last_seen > stale_timeout` and returns
    /// their keys. A record exactly `stale_timeout` old is kept.
    pub fn prune(&mut self, now: Instant, stale_timeout: Duration) -> Vec<SessionKey> {
        let mut pruned = Vec::new();
        self.entries.retain(|key, entry| {
            let age = now.saturating_duration_since(entry.record.last_seen);
            let keep = age <= stale_timeout;
            if !keep {
                pruned.push(*key);
            }
            keep
        });
        if !pruned.is_empty() {
            debug!("pruned {} stale session(s)", pruned.len());
        }
        pruned
    }

    /// Live records in first-discovery order.
    pub fn snapshot(&self) -> Vec<SessionRecord> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| entry.record.clone()).collect()
    }

    pub fn get(&self, key: &SessionKey) -> Option<&SessionRecord> {
        self.entries.get(key).map(|entry| &entry.record)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cloneable, thread-safe handle to a [`SessionRegistry`].
#[derive(Clone, Default)]
pub struct SharedSessionRegistry {
    inner: Arc<Mutex<SessionRegistry>>,
}

impl SharedSessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionRegistry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_discovery(&self, event: DiscoveryEvent) {
        self.lock().record_discovery(event, Instant::now());
    }

    pub fn record_discovery_at(&self, event: DiscoveryEvent, now: Instant) {
        self.lock().record_discovery(event, now);
    }

    pub fn remove_explicit(&self, source: DiscoverySource, id: SessionId) -> bool {
        self.lock().remove_explicit(source, id)
    }

    pub fn prune(&self, now: Instant, stale_timeout: Duration) -> Vec<SessionKey> {
        self.lock().prune(now, stale_timeout)
    }

    /// Applies one lobby listing's upserts and removals under a single lock,
    /// so no snapshot observes a half-applied listing.
    pub fn apply_listing(&self, listing: &LobbyListing) {
        let now = Instant::now();
        let mut registry = self.lock();
        for event in &listing.sessions {
            registry.record_discovery(event.clone(), now);
        }
        for id in &listing.removed {
            registry.remove_explicit(DiscoverySource::LobbyService, *id);
        }
    }

    pub fn snapshot(&self) -> Vec<SessionRecord> {
        self.lock().snapshot()
    }

    pub fn get(&self, key: &SessionKey) -> Option<SessionRecord> {
        self.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Spawns a task that prunes every `interval`, independent of discovery
    /// traffic. Abort the returned handle to stop it.
    pub fn spawn_pruner(&self, interval: Duration, stale_timeout: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        info!(
            "pruning sessions older than {:.1}s every {:.1}s",
            stale_timeout.as_secs_f64(),
            interval.as_secs_f64()
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                registry.prune(Instant::now(), stale_timeout);
            }
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
