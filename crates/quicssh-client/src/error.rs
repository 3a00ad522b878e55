//! Tunnel client error types.

use std::io;

use crate::relay::Direction;

/// Errors that can end a tunnel run.
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    /// The remote address is not a usable `host:port` pair. Raised before dialing.
    #[error("Failed to parse address {addr:?}: {reason}")]
    AddressParse { addr: String, reason: &'static str },

    /// The TLS client configuration could not be built.
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Session establishment failed.
    #[error("Dial error: {0}")]
    Dial(String),

    /// No bidirectional stream could be opened on the session.
    #[error("Stream open error: {0}")]
    StreamOpen(String),

    /// A relay loop hit an I/O error.
    #[error("Relay error ({direction}): {source}")]
    Relay {
        direction: Direction,
        #[source]
        source: io::Error,
    },

    /// A relay loop task died without reporting a result.
    #[error("Relay task failed: {0}")]
    RelayTask(String),

    /// Session teardown failed. Only ever logged.
    #[error("Session close error: {0}")]
    Close(String),
}

impl TunnelError {
    pub(crate) fn address(addr: &str, reason: &'static str) -> Self {
        Self::AddressParse {
            addr: addr.to_string(),
            reason,
        }
    }

    pub(crate) fn relay(direction: Direction, source: io::Error) -> Self {
        Self::Relay { direction, source }
    }
}
