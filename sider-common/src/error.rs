//! # Codec Errors
//!
//! Purpose: Distinguish the three ways the wire layer can fail without
//! touching the network.
//!
//! ## Design Principles
//! 1. **Fail Fast**: Corrupt framing is an error, never a silent misparse.
//! 2. **In-Band Replies**: A server `-ERR` reply is a value ([`ServerError`]),
//!    not a codec failure.

use thiserror::Error;

/// Result alias for decoding.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// The byte stream could not be decoded as RESP.
///
/// Once returned by `feed`, the stream is poisoned and the connection that
/// produced it should be discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// First byte of a frame is not one of `+ - : $ *`.
    #[error("invalid type marker: 0x{0:02x}")]
    InvalidTypeMarker(u8),

    /// Integer reply or length prefix is not a decimal number.
    #[error("invalid integer: {0:?}")]
    InvalidInteger(String),

    /// Bulk string length below `-1`.
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array length below `-1`.
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Bulk payload not terminated by CRLF.
    #[error("missing CRLF after bulk string")]
    MissingCrlf,

    /// Strict text decoding was requested and the payload is not UTF-8.
    #[error("invalid utf-8 in reply: {0}")]
    InvalidUtf8(String),

    /// Rejected by the accelerated decoder.
    #[error("invalid RESP frame: {0}")]
    Native(String),
}

/// A command could not be encoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Redis has no representation for a null argument.
    #[error("argument {index} of '{command}' is null")]
    NullArgument { command: String, index: usize },
}

/// Error reply sent by the server (`-ERR ...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("{message}")]
pub struct ServerError {
    message: String,
}

impl ServerError {
    pub fn new(message: impl Into<String>) -> Self {
        ServerError {
            message: message.into(),
        }
    }

    /// Full error text, including the leading code (e.g. `WRONGPASS ...`).
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The error code: the first word of the message, such as `ERR`.
    pub fn code(&self) -> &str {
        self.message.split_whitespace().next().unwrap_or("")
    }
}
