//! Domain entities for session discovery and connection lifecycle.
//!
//! Everything in here is plain data with no I/O. The node crate builds its
//! registry, arbitrator and state machine on top of these types.

/// Application handshake tag used to filter discovery traffic.
pub mod handshake;

/// Connection state machine states and session modes.
pub mod lifecycle;

/// Discovered sessions and how to reach them.
pub mod session;
