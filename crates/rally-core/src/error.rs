//! Error taxonomy returned by the session lifecycle API.
//!
//! Only [`SessionError::TransportUnavailable`],
//! [`SessionError::InvalidStateTransition`] and the transport/template
//! variants ever reach a caller of `host`/`join`. The lobby-service and probe
//! variants exist so optional subsystems can log a typed error at their
//! boundary before swallowing it.

use std::net::SocketAddr;

use thiserror::Error;

use crate::domain::lifecycle::{ConnectionState, Operation, SessionMode};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// No registered backend can serve the requested mode.
    #[error("no transport backend available for {mode} mode")]
    TransportUnavailable { mode: SessionMode },

    /// The operation is not valid from the current state. No state changed.
    #[error("cannot {operation} while {state}")]
    InvalidStateTransition {
        operation: Operation,
        state: ConnectionState,
    },

    /// The external lobby service is unreachable or refused the request.
    #[error("lobby service unavailable: {0}")]
    LobbyServiceUnavailable(String),

    /// A single broadcast probe could not be sent.
    #[error("discovery probe to {target} failed: {reason}")]
    DiscoveryProbeFailed { target: SocketAddr, reason: String },

    /// Hosting was requested but the presentation layer has no session/player
    /// template configured.
    #[error("no session template configured")]
    MissingPlayerTemplate,

    /// The active backend reported a failure while connecting or listening.
    #[error("transport failure: {0}")]
    Transport(String),

    /// A pending join was aborted by `stop()`.
    #[error("connection attempt cancelled")]
    Cancelled,
}

impl SessionError {
    /// Convenience constructor for the common state-guard failure.
    pub fn invalid_transition(operation: Operation, state: ConnectionState) -> Self {
        SessionError::InvalidStateTransition { operation, state }
    }
}
