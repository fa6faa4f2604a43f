//! Infrastructure layer for a Rally node.
//!
//! Contains the adapters that touch the outside world: UDP discovery sockets,
//! the lobby directory, transport backends, and the configuration file.
//!
//! - **`network`** – LAN broadcast discovery (browsing and hosting sides).
//! - **`lobby`** – Lobby-service discovery and the host's own lobby.
//! - **`transport`** – The `TransportBackend` capability, the TCP backend, and
//!   a recording mock.
//! - **`storage`** – TOML configuration.

pub mod lobby;
pub mod network;
pub mod storage;
pub mod transport;
