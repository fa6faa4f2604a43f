//! Connection lifecycle vocabulary shared by the controller and its callers.
//!
//! ```text
//!            host()                      join()
//!   Idle ───────────► Hosting     Idle ───────► Connecting ──► Connected
//!    ▲                   │          ▲               │              │
//!    └──── stop() ───────┘          └──── stop() / connect failure ┘
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which family of transports and discovery a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// Plain `address:port` transports discovered by LAN broadcast.
    LocalNetwork,
    /// Lobby-service connect tokens discovered through the lobby directory.
    LobbyService,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::LocalNetwork => f.write_str("local-network"),
            SessionMode::LobbyService => f.write_str("lobby-service"),
        }
    }
}

/// Process-wide connection state. Mutated only by the connection controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Idle,
    Hosting,
    Connecting,
    Connected,
}

impl ConnectionState {
    /// `true` for every state other than [`ConnectionState::Idle`].
    pub fn is_active(self) -> bool {
        self != ConnectionState::Idle
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Hosting => "hosting",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// A state-changing request, named in [`crate::SessionError::InvalidStateTransition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Host,
    Join,
    SelectTransport,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Host => f.write_str("host"),
            Operation::Join => f.write_str("join"),
            Operation::SelectTransport => f.write_str("select a transport"),
        }
    }
}
