//! Discovered sessions and the events that create and refresh them.
//!
//! A [`DiscoveryEvent`] is what an adapter reports when it hears about a
//! session; a [`SessionRecord`] is what the registry keeps once the event has
//! been merged. Identity is [`SessionKey`]: the id namespace is scoped to the
//! source, so a broadcast response and a lobby entry with the same numeric id
//! are two different sessions.

use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::lifecycle::SessionMode;

/// Source-scoped session identity (server id for broadcast, lobby id for
/// the lobby service).
pub type SessionId = u64;

/// Where a session was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiscoverySource {
    Broadcast,
    LobbyService,
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoverySource::Broadcast => f.write_str("broadcast"),
            DiscoverySource::LobbyService => f.write_str("lobby"),
        }
    }
}

/// Registry key: `(source, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    pub source: DiscoverySource,
    pub id: SessionId,
}

impl SessionKey {
    pub fn new(source: DiscoverySource, id: SessionId) -> Self {
        Self { source, id }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.id)
    }
}

/// How to reach a session.
///
/// The two variants belong to different transport families and are never
/// interchangeable: an endpoint needs a plain `address:port` transport, a lobby
/// token needs a transport that can resolve lobby-service connect tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectDescriptor {
    /// A network endpoint reachable directly.
    Endpoint(SocketAddr),
    /// Opaque host identifier published in the host's lobby metadata.
    LobbyToken(String),
}

impl ConnectDescriptor {
    /// The session mode whose transports can use this descriptor.
    pub fn mode(&self) -> SessionMode {
        match self {
            ConnectDescriptor::Endpoint(_) => SessionMode::LocalNetwork,
            ConnectDescriptor::LobbyToken(_) => SessionMode::LobbyService,
        }
    }

    /// Resolves the descriptor to the URI handed to a transport at join time.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rally_core::ConnectDescriptor;
    ///
    /// let d = ConnectDescriptor::Endpoint("192.168.1.20:7777".parse().unwrap());
    /// assert_eq!(d.connect_uri(), "tcp://192.168.1.20:7777");
    ///
    /// let d = ConnectDescriptor::LobbyToken("76561198000000000".into());
    /// assert_eq!(d.connect_uri(), "lobby://76561198000000000");
    /// ```
    pub fn connect_uri(&self) -> String {
        match self {
            ConnectDescriptor::Endpoint(addr) => format!("tcp://{addr}"),
            ConnectDescriptor::LobbyToken(token) => format!("lobby://{token}"),
        }
    }
}

impl fmt::Display for ConnectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.connect_uri())
    }
}

/// One sighting of a session, as reported by a discovery adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEvent {
    pub source: DiscoverySource,
    pub id: SessionId,
    pub display_name: Option<String>,
    pub descriptor: ConnectDescriptor,
}

impl DiscoveryEvent {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.source, self.id)
    }
}

/// A discovered, joinable session as held by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub display_name: Option<String>,
    pub descriptor: ConnectDescriptor,
    pub source: DiscoverySource,
    /// Monotonic time of the most recent (re)discovery.
    pub last_seen: Instant,
}

impl SessionRecord {
    /// Builds a record from `event`, stamped with `seen_at`.
    pub fn from_event(event: DiscoveryEvent, seen_at: Instant) -> Self {
        Self {
            id: event.id,
            display_name: event.display_name,
            descriptor: event.descriptor,
            source: event.source,
            last_seen: seen_at,
        }
    }

    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.source, self.id)
    }

    /// The display name, or a label derived from the descriptor when the
    /// source did not provide one.
    pub fn label(&self) -> String {
        match &self.display_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self.descriptor.to_string(),
        }
    }
}
