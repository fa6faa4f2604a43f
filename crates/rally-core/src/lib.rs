//! # rally-core
//!
//! Shared library for Rally containing the session domain types, the error
//! taxonomy surfaced to callers of the node API, and the LAN discovery packet
//! codec.
//!
//! This crate is used by the node crate and by anything that needs to read a
//! discovery snapshot. It has zero dependencies on sockets, async runtimes, or
//! external lobby services.
//!
//! # Architecture overview
//!
//! Rally finds joinable multiplayer sessions from two independent sources (a
//! local-network broadcast protocol and an external lobby directory), merges
//! them into one view, and decides which network transport is active while a
//! session is hosted or joined.
//!
//! - **`domain`** – Plain data: what a discovered session looks like, how to
//!   reach it, the connection state machine's states, and the handshake tag
//!   that keeps unrelated applications from seeing each other.
//!
//! - **`protocol`** – How discovery requests and responses travel over UDP.
//!
//! - **`error`** – The [`SessionError`] taxonomy returned by `host`, `join`
//!   and `stop`.

pub mod domain;
pub mod error;
pub mod protocol;

pub use domain::handshake::HandshakeTag;
pub use domain::lifecycle::{ConnectionState, Operation, SessionMode};
pub use domain::session::{
    ConnectDescriptor, DiscoveryEvent, DiscoverySource, SessionId, SessionKey, SessionRecord,
};
pub use error::SessionError;
pub use protocol::codec::{decode_packet, encode_packet, ProtocolError};
pub use protocol::messages::{DiscoveryPacket, DiscoveryResponse};
