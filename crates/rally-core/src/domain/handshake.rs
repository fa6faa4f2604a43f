//! Application-specific handshake tag.
//!
//! Two applications sharing the same lobby service, or the same LAN broadcast
//! port, must never see each other's sessions. Every discovery packet and every
//! advertised lobby therefore carries a 64-bit tag derived from the
//! application's name. The tag is a 64-bit FNV-1a fold over the UTF-8 bytes of
//! the name, so it is stable across processes, platforms and releases.

use std::fmt;

use serde::{Deserialize, Serialize};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit value identifying one application on shared discovery channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandshakeTag(u64);

impl HandshakeTag {
    /// Derives the tag for `app_name`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rally_core::HandshakeTag;
    ///
    /// let a = HandshakeTag::from_app_name("rally");
    /// let b = HandshakeTag::from_app_name("rally");
    /// assert_eq!(a, b);
    /// assert_ne!(a, HandshakeTag::from_app_name("other-game"));
    /// ```
    pub const fn from_app_name(app_name: &str) -> Self {
        Self(fnv1a_64(app_name.as_bytes()))
    }

    /// Wraps a raw tag value read off the wire or out of lobby metadata.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw 64-bit value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Parses the decimal form stored in lobby metadata.
    pub fn parse(value: &str) -> Option<Self> {
        value.trim().parse::<u64>().ok().map(Self)
    }
}

impl fmt::Display for HandshakeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}
