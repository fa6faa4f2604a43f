//! Discovery packet definitions.
//!
//! All constants related to the wire format live here so the codec and the
//! node crate share a single source of truth.

use serde::{Deserialize, Serialize};

use crate::domain::session::SessionId;

/// Four bytes at the start of every datagram; anything else is foreign traffic.
pub const PACKET_MAGIC: [u8; 4] = *b"RLLY";

/// Current protocol version. Increment on breaking wire changes.
pub const PROTOCOL_VERSION: u8 = 1;

/// `[magic:4][version:1][type:1][reserved:2][handshake:8][payload_len:4]`
pub const HEADER_SIZE: usize = 20;

/// Largest datagram either side will send or accept.
pub const MAX_PACKET_SIZE: usize = 1024;

/// Packet type discriminants carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Request = 0x01,
    Response = 0x02,
}

impl TryFrom<u8> for PacketType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x01 => Ok(PacketType::Request),
            0x02 => Ok(PacketType::Response),
            other => Err(other),
        }
    }
}

/// A hosting node's answer to a discovery request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    /// Id chosen by the host for the lifetime of its hosting session.
    pub server_id: SessionId,
    /// Human-readable session name. May be empty.
    pub display_name: String,
    /// Port the host's game transport listens on. Combined with the datagram's
    /// source address to form the connect endpoint.
    pub game_port: u16,
}

/// Every packet that can appear on the discovery port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryPacket {
    /// "Is anyone hosting?" Empty payload.
    Request,
    Response(DiscoveryResponse),
}

impl DiscoveryPacket {
    pub fn packet_type(&self) -> PacketType {
        match self {
            DiscoveryPacket::Request => PacketType::Request,
            DiscoveryPacket::Response(_) => PacketType::Response,
        }
    }
}
