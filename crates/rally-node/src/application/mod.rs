//! Application layer use cases for a Rally node.
//!
//! Use cases in this layer orchestrate the domain types from `rally_core` and
//! talk to the outside world only through the capability traits defined in
//! the infrastructure layer (`TransportBackend`, `LobbyService`,
//! `InterfaceSource`), so every use case runs against test doubles.
//!
//! # Sub-modules
//!
//! - **`session_registry`** – Merges discovery events from both sources into
//!   one deduplicated, pruned set of sessions.
//!
//! - **`transport_arbitrator`** – Picks and activates the single transport
//!   backend for a session mode.
//!
//! - **`connection_lifecycle`** – The Idle/Hosting/Connecting/Connected state
//!   machine behind `host`, `join` and `stop`.
//!
//! - **`lobby_lifecycle`** – Creates the host's lobby when hosting starts and
//!   destroys it exactly once when hosting ends.
//!
//! - **`discover_sessions`** – Runs discovery cycles and pumps results into the
//!   registry.
//!
//! - **`session_node`** – The context object tying all of the above together.

pub mod connection_lifecycle;
pub mod discover_sessions;
pub mod lobby_lifecycle;
pub mod session_node;
pub mod session_registry;
pub mod transport_arbitrator;
