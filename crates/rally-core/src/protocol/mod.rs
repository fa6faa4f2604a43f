//! LAN discovery protocol: packet types and the binary codec.
//!
//! - **`messages`** – The request a browsing node broadcasts and the response
//!   a hosting node sends back.
//! - **`codec`** – Framing with magic, version and handshake tag, plus the
//!   `bincode` payload.

pub mod codec;
pub mod messages;

pub use codec::{decode_packet, encode_packet, ProtocolError};
pub use messages::{DiscoveryPacket, DiscoveryResponse, PacketType};
