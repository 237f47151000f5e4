//! Session error types.
//!
//! One taxonomy covers the whole run: connection establishment, the TLS
//! upgrade, the handshake, and console input. Errors raised before the duplex
//! phase abort the run; inside the duplex phase each half reports its own
//! failure through [`crate::SessionReport`] instead.

use std::{io, time::Duration};

use thiserror::Error;

use crate::Endpoint;

/// Errors that end a client run.
#[derive(Debug, Error)]
pub enum SessionError {
    /// TCP handshake did not complete within the connect bound.
    #[error("connection to {endpoint} timed out after {}s", .after.as_secs())]
    ConnectTimeout {
        /// Server we tried to reach.
        endpoint: Endpoint,
        /// Bound that was exceeded.
        after: Duration,
    },

    /// Server actively refused the connection.
    #[error("connection refused by {endpoint}")]
    ConnectRefused {
        /// Server we tried to reach.
        endpoint: Endpoint,
    },

    /// Host name did not resolve to any address.
    #[error("could not resolve host {endpoint}: {source}")]
    UnknownHost {
        /// Server we tried to reach.
        endpoint: Endpoint,
        /// Resolver failure.
        #[source]
        source: io::Error,
    },

    /// Host or network unreachable.
    #[error("host unreachable: {endpoint}")]
    HostUnreachable {
        /// Server we tried to reach.
        endpoint: Endpoint,
    },

    /// Any other I/O failure on the stream (reset, unexpected EOF, ...).
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),

    /// TLS negotiation failed or the server certificate was rejected.
    #[error("security handshake failed: {0}")]
    SecurityHandshake(String),

    /// Malformed server response.
    ///
    /// Reserved: the textual protocol currently treats every response that
    /// does not signal success as "try again".
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid client configuration (unreadable trust anchors, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading user input failed.
    #[error("input error: {0}")]
    Input(#[source] io::Error),
}

impl SessionError {
    /// Map a failed TCP connect to the matching variant.
    pub fn from_connect(endpoint: &Endpoint, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => {
                Self::ConnectRefused { endpoint: endpoint.clone() }
            },
            io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
                Self::HostUnreachable { endpoint: endpoint.clone() }
            },
            _ => Self::Transport(err),
        }
    }

    /// Follow-up advice printed after the error itself, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ConnectTimeout { .. } => Some(
                "The server did not respond in a timely manner. It may be offline or congested.",
            ),
            Self::ConnectRefused { .. }
            | Self::UnknownHost { .. }
            | Self::HostUnreachable { .. } => Some(
                "The server may be offline or unreachable. Please check your connection details \
                 and try again.",
            ),
            Self::Transport(_)
            | Self::SecurityHandshake(_)
            | Self::Protocol(_)
            | Self::Config(_)
            | Self::Input(_) => None,
        }
    }

    /// Returns true if the error happened while establishing the connection.
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. }
                | Self::ConnectRefused { .. }
                | Self::UnknownHost { .. }
                | Self::HostUnreachable { .. }
                | Self::SecurityHandshake(_)
        )
    }
}
