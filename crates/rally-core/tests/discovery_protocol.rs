//! Integration tests for the discovery packet codec through the public API.
//!
//! These check the properties the node crate relies on when it receives
//! arbitrary datagrams on a shared UDP port: foreign traffic is rejected with a
//! typed error instead of a panic, and packets from the same application
//! decode to exactly what was sent.

use rally_core::protocol::messages::{HEADER_SIZE, PACKET_MAGIC};
use rally_core::{decode_packet, encode_packet, DiscoveryPacket, DiscoveryResponse, HandshakeTag, ProtocolError};

#[test]
fn test_response_with_unicode_display_name_decodes_intact() {
    let tag = HandshakeTag::from_app_name("rally");
    let packet = DiscoveryPacket::Response(DiscoveryResponse {
        server_id: u64::MAX,
        display_name: "Küche – 4 Spieler".to_string(),
        game_port: 65535,
    });

    let bytes = encode_packet(&packet, tag).expect("encode");
    let decoded = decode_packet(&bytes, tag).expect("decode");

    assert_eq!(decoded, packet);
}

#[test]
fn test_two_applications_on_one_port_ignore_each_other() {
    // Arrange: two apps whose names differ by one character
    let ours = HandshakeTag::from_app_name("rally");
    let theirs = HandshakeTag::from_app_name("rallx");
    let bytes = encode_packet(&DiscoveryPacket::Request, theirs).expect("encode");

    // Act
    let result = decode_packet(&bytes, ours);

    // Assert
    assert!(matches!(result, Err(ProtocolError::HandshakeMismatch { .. })));
}

#[test]
fn test_random_noise_never_panics() {
    let tag = HandshakeTag::from_app_name("rally");
    // Deterministic pseudo-random bytes (xorshift) of every length up to 64.
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    for len in 0..64 {
        let mut buf = Vec::with_capacity(len);
        for _ in 0..len {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            buf.push(state as u8);
        }
        assert!(decode_packet(&buf, tag).is_err(), "noise of len {len} decoded");
    }
}

#[test]
fn test_header_with_magic_but_garbage_payload_is_malformed() {
    // Arrange: a valid header declaring a 3-byte response payload
    let tag = HandshakeTag::from_app_name("rally");
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&PACKET_MAGIC);
    bytes.push(1);
    bytes.push(0x02);
    bytes.extend_from_slice(&[0, 0]);
    bytes.extend_from_slice(&tag.raw().to_be_bytes());
    bytes.extend_from_slice(&3u32.to_be_bytes());
    bytes.extend_from_slice(&[0xFF, 0xFF, 0xFF]);
    assert_eq!(bytes.len(), HEADER_SIZE + 3);

    // Act
    let result = decode_packet(&bytes, tag);

    // Assert
    assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
}
