//! Binary codec for discovery packets.
//!
//! Wire format:
//! ```text
//! [magic:4 "RLLY"][version:1][msg_type:1][reserved:2][handshake:8][payload_len:4][payload:N]
//! ```
//! Total header size: 20 bytes. All multi-byte integers are big-endian. The
//! response payload is a `bincode` encoding of [`DiscoveryResponse`].

use thiserror::Error;

use crate::domain::handshake::HandshakeTag;
use crate::protocol::messages::{
    DiscoveryPacket, DiscoveryResponse, PacketType, HEADER_SIZE, MAX_PACKET_SIZE, PACKET_MAGIC,
    PROTOCOL_VERSION,
};

/// Errors that can occur during packet encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the header.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The datagram does not start with [`PACKET_MAGIC`].
    #[error("not a discovery packet (bad magic)")]
    BadMagic,

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("unknown packet type: 0x{0:02X}")]
    UnknownPacketType(u8),

    /// The packet belongs to a different application.
    #[error("handshake mismatch: expected {expected}, got {actual}")]
    HandshakeMismatch { expected: u64, actual: u64 },

    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },

    /// The encoded packet would not fit in one datagram.
    #[error("packet of {0} bytes exceeds the datagram limit")]
    TooLarge(usize),

    /// The payload could not be (de)serialised.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Encodes `packet` tagged with `handshake`.
///
/// # Errors
///
/// Returns [`ProtocolError::TooLarge`] if the result would exceed
/// [`MAX_PACKET_SIZE`], or [`ProtocolError::MalformedPayload`] if serialisation
/// fails.
///
/// # Examples
///
/// ```rust
/// use rally_core::{decode_packet, encode_packet, DiscoveryPacket, HandshakeTag};
///
/// let tag = HandshakeTag::from_app_name("rally");
/// let bytes = encode_packet(&DiscoveryPacket::Request, tag).unwrap();
/// assert_eq!(decode_packet(&bytes, tag).unwrap(), DiscoveryPacket::Request);
/// ```
pub fn encode_packet(
    packet: &DiscoveryPacket,
    handshake: HandshakeTag,
) -> Result<Vec<u8>, ProtocolError> {
    let payload = match packet {
        DiscoveryPacket::Request => Vec::new(),
        DiscoveryPacket::Response(response) => bincode::serialize(response)
            .map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?,
    };

    let total = HEADER_SIZE + payload.len();
    if total > MAX_PACKET_SIZE {
        return Err(ProtocolError::TooLarge(total));
    }

    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&PACKET_MAGIC);
    buf.push(PROTOCOL_VERSION);
    buf.push(packet.packet_type() as u8);
    buf.extend_from_slice(&[0x00, 0x00]); // reserved
    buf.extend_from_slice(&handshake.raw().to_be_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decodes one packet and checks it carries the `expected` handshake.
///
/// # Errors
///
/// Returns a [`ProtocolError`] describing the first problem found. Callers on
/// the discovery port treat every error as "not for us" and drop the datagram.
pub fn decode_packet(
    bytes: &[u8],
    expected: HandshakeTag,
) -> Result<DiscoveryPacket, ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }
    if bytes[0..4] != PACKET_MAGIC {
        return Err(ProtocolError::BadMagic);
    }

    let version = bytes[4];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let packet_type = PacketType::try_from(bytes[5]).map_err(ProtocolError::UnknownPacketType)?;

    // bytes[6..8] are reserved – ignored on decode

    let actual = read_u64(bytes, 8);
    if actual != expected.raw() {
        return Err(ProtocolError::HandshakeMismatch {
            expected: expected.raw(),
            actual,
        });
    }

    let payload_len = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]) as usize;
    let available = bytes.len() - HEADER_SIZE;
    if available < payload_len {
        return Err(ProtocolError::PayloadLengthMismatch {
            declared: payload_len,
            available,
        });
    }
    let payload = &bytes[HEADER_SIZE..HEADER_SIZE + payload_len];

    match packet_type {
        PacketType::Request => Ok(DiscoveryPacket::Request),
        PacketType::Response => bincode::deserialize::<DiscoveryResponse>(payload)
            .map(DiscoveryPacket::Response)
            .map_err(|e| ProtocolError::MalformedPayload(e.to_string())),
    }
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_be_bytes(raw)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tag() -> HandshakeTag {
        HandshakeTag::from_app_name("rally")
    }

    fn response() -> DiscoveryPacket {
        DiscoveryPacket::Response(DiscoveryResponse {
            server_id: 0xDEAD_BEEF,
            display_name: "Living room".to_string(),
            game_port: 7777,
        })
    }

    #[test]
    fn test_request_encodes_to_header_only() {
        let bytes = encode_packet(&DiscoveryPacket::Request, tag()).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..4], b"RLLY");
        assert_eq!(bytes[5], PacketType::Request as u8);
    }

    #[test]
    fn test_response_survives_encode_decode() {
        // Arrange
        let original = response();

        // Act
        let bytes = encode_packet(&original, tag()).unwrap();
        let decoded = decode_packet(&bytes, tag()).unwrap();

        // Assert
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_rejects_foreign_handshake() {
        let bytes = encode_packet(&response(), HandshakeTag::from_app_name("other")).unwrap();
        let err = decode_packet(&bytes, tag()).unwrap_err();
        assert!(matches!(err, ProtocolError::HandshakeMismatch { .. }));
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut bytes = encode_packet(&DiscoveryPacket::Request, tag()).unwrap();
        bytes[0] = b'X';
        assert_eq!(decode_packet(&bytes, tag()), Err(ProtocolError::BadMagic));
    }

    #[test]
    fn test_decode_rejects_short_input() {
        let err = decode_packet(&[0u8; 5], tag()).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InsufficientData {
                needed: HEADER_SIZE,
                available: 5
            }
        );
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut bytes = encode_packet(&DiscoveryPacket::Request, tag()).unwrap();
        bytes[4] = 99;
        assert_eq!(
            decode_packet(&bytes, tag()),
            Err(ProtocolError::UnsupportedVersion(99))
        );
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        // Arrange: drop the last byte of a response
        let mut bytes = encode_packet(&response(), tag()).unwrap();
        bytes.pop();

        // Act
        let err = decode_packet(&bytes, tag()).unwrap_err();

        // Assert
        assert!(matches!(err, ProtocolError::PayloadLengthMismatch { .. }));
    }

    #[test]
    fn test_encode_rejects_oversized_display_name() {
        let packet = DiscoveryPacket::Response(DiscoveryResponse {
            server_id: 1,
            display_name: "x".repeat(MAX_PACKET_SIZE),
            game_port: 1,
        });
        assert!(matches!(
            encode_packet(&packet, tag()),
            Err(ProtocolError::TooLarge(_))
        ));
    }
}
