//! # Client Errors
//!
//! Purpose: One error type for everything the connection manager and pool
//! can report.

use std::fmt;
use std::io;

use sider_common::{EncodeError, ProtocolError, ServerError};
use thiserror::Error;

/// Result type for the async client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Which wait ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    Connect,
    Read,
    Write,
    /// Waiting for a free pool item.
    Checkout,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            TimeoutPhase::Connect => "connect",
            TimeoutPhase::Read => "read",
            TimeoutPhase::Write => "write",
            TimeoutPhase::Checkout => "pool checkout",
        };
        f.write_str(phase)
    }
}

/// URL or option validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Scheme is required")]
    SchemeRequired,
    #[error("Scheme is not supported: {0}")]
    UnsupportedScheme(String),
    #[error("Hostname is required")]
    HostnameRequired,
    #[error("Unix socket path is required")]
    SocketPathRequired,
    #[error("db param must be integer, got {0:?}")]
    InvalidDb(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Errors surfaced by the async client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Network failure while connecting, reading or writing.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("{0} timed out")]
    Timeout(TimeoutPhase),

    /// The server closed the connection.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// Reply bytes could not be decoded; the connection was dropped.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Error reply during the AUTH/SELECT handshake.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    #[error("tls error: {0}")]
    Tls(String),

    /// A pub/sub listener owns the connection's read side.
    #[error("pub/sub listener is active")]
    PubSubActive,

    /// The pub/sub queue was closed.
    #[error("pub/sub queue is closed")]
    QueueClosed,

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("pool is closed")]
    PoolClosed,
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout(_))
    }

    /// True when the same call may succeed on a fresh connection.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::Timeout(_)
                | ClientError::ConnectionClosed
                | ClientError::Protocol(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_phase() {
        let err = ClientError::Timeout(TimeoutPhase::Checkout);
        assert_eq!(err.to_string(), "pool checkout timed out");
        assert!(err.is_timeout());
        assert!(err.is_retryable());
    }

    #[test]
    fn config_errors_pass_through() {
        let err = ClientError::from(ConfigError::SchemeRequired);
        assert_eq!(err.to_string(), "Scheme is required");
        assert!(!err.is_retryable());
        assert!(!ClientError::Server(ServerError::new("ERR")).is_retryable());
    }
}
