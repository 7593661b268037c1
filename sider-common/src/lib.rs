//! # sider-common
//!
//! Purpose: Wire-level building blocks shared by the sider client: reply and
//! argument types, the RESP2 codec and the protocol backends.
//!
//! ## Design Principles
//! 1. **No I/O**: Everything here works on byte buffers only.
//! 2. **Explicit Errors**: Corruption, encoding and server errors are separate
//!    types so callers can react to each.

pub mod codec;
pub mod error;
pub mod protocol;
pub mod types;

pub use codec::{encode, encode_command, make_cmd, Decoded, Decoder};
pub use error::{EncodeError, ProtocolError, ProtocolResult, ServerError};
pub use protocol::{new_protocol, Backend, Protocol, PureProtocol};
#[cfg(feature = "native")]
pub use protocol::NativeProtocol;
pub use types::{Arg, Command, Utf8Policy, WireValue};
