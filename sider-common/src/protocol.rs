//! # Protocol Backends
//!
//! Purpose: Wrap a decoder and its unparsed bytes behind one stateful
//! interface that the connection layer can feed socket reads into.
//!
//! ## Design Principles
//! 1. **Swappable Backends**: The pure state machine is always built; the
//!    accelerated decoder is a cargo feature behind the same trait.
//! 2. **FIFO Replies**: Values come out of `gets` in wire order.
//! 3. **Optimistic `has_data`**: Any buffered byte or open array counts.

use std::collections::VecDeque;
use std::fmt;

use bytes::BytesMut;

use crate::codec::{self, Decoded, Decoder};
use crate::error::{EncodeError, ProtocolResult};
use crate::types::{Arg, Utf8Policy, WireValue};

/// Which decoder implementation backs a [`Protocol`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Pure,
    Native,
}

impl Backend {
    /// `Native` when compiled in, otherwise `Pure`.
    pub fn preferred() -> Self {
        if Backend::Native.is_available() {
            Backend::Native
        } else {
            Backend::Pure
        }
    }

    pub fn is_available(self) -> bool {
        match self {
            Backend::Pure => true,
            Backend::Native => cfg!(feature = "native"),
        }
    }

    /// Every backend compiled into this build.
    pub fn available() -> Vec<Backend> {
        [Backend::Pure, Backend::Native]
            .into_iter()
            .filter(|backend| backend.is_available())
            .collect()
    }
}

impl Default for Backend {
    fn default() -> Self {
        Backend::preferred()
    }
}

/// Stateful RESP reader plus command encoder.
pub trait Protocol: Send + fmt::Debug {
    /// Appends raw bytes and decodes every reply they complete.
    ///
    /// On error, replies completed before the corruption stay readable but
    /// the stream must not be fed again.
    fn feed(&mut self, data: &[u8]) -> ProtocolResult<()>;

    /// Pops the oldest decoded reply.
    fn gets(&mut self) -> Option<WireValue>;

    /// True if a reply is ready or partially buffered.
    fn has_data(&self) -> bool;

    /// Forgets all buffered bytes, open arrays and ready replies.
    fn reset(&mut self);

    fn make_cmd(&self, name: &str, args: &[Arg]) -> Result<Vec<u8>, EncodeError> {
        codec::make_cmd(name, args)
    }

    fn backend(&self) -> Backend;
}

impl fmt::Display for dyn Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Protocol[native={}]", self.backend() == Backend::Native)
    }
}

/// Builds a protocol instance for `backend`.
///
/// Falls back to the pure decoder when `backend` is not compiled in.
pub fn new_protocol(backend: Backend, text: Option<Utf8Policy>) -> Box<dyn Protocol> {
    match backend {
        #[cfg(feature = "native")]
        Backend::Native => Box::new(native::NativeProtocol::new(text)),
        _ => Box::new(PureProtocol::new(text)),
    }
}

/// Protocol backed by the in-crate [`Decoder`].
#[derive(Debug, Default)]
pub struct PureProtocol {
    buf: BytesMut,
    decoder: Decoder,
    ready: VecDeque<WireValue>,
}

impl PureProtocol {
    pub fn new(text: Option<Utf8Policy>) -> Self {
        PureProtocol {
            buf: BytesMut::with_capacity(4096),
            decoder: Decoder::new(text),
            ready: VecDeque::new(),
        }
    }
}

impl Protocol for PureProtocol {
    fn feed(&mut self, data: &[u8]) -> ProtocolResult<()> {
        self.buf.extend_from_slice(data);
        while let Decoded::Complete(value) = self.decoder.decode(&mut self.buf)? {
            self.ready.push_back(value);
        }
        Ok(())
    }

    fn gets(&mut self) -> Option<WireValue> {
        self.ready.pop_front()
    }

    fn has_data(&self) -> bool {
        !self.ready.is_empty() || !self.buf.is_empty() || self.decoder.in_progress()
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.decoder.reset();
        self.ready.clear();
    }

    fn backend(&self) -> Backend {
        Backend::Pure
    }
}

#[cfg(feature = "native")]
pub use native::NativeProtocol;

#[cfg(feature = "native")]
mod native {
    use std::collections::VecDeque;

    use bytes::BytesMut;
    use memchr::memmem;
    use redis_protocol::resp2::decode::decode_mut;
    use redis_protocol::resp2::types::Frame;

    use super::{Backend, Protocol};
    use crate::codec::decode_text;
    use crate::error::{ProtocolError, ProtocolResult, ServerError};
    use crate::types::{Utf8Policy, WireValue};

    /// Protocol backed by `redis-protocol`'s RESP2 decoder.
    #[derive(Debug)]
    pub struct NativeProtocol {
        buf: BytesMut,
        ready: VecDeque<WireValue>,
        text: Option<Utf8Policy>,
    }

    impl NativeProtocol {
        pub fn new(text: Option<Utf8Policy>) -> Self {
            NativeProtocol {
                buf: BytesMut::with_capacity(4096),
                ready: VecDeque::new(),
                text,
            }
        }

        /// Converts `frame`, walking its wire bytes in `raw` from `pos`.
        ///
        /// `redis-protocol` folds `*-1` and `$-1` into one null frame; the
        /// marker byte in `raw` tells them apart.
        fn convert(&self, frame: Frame, raw: &[u8], pos: &mut usize) -> ProtocolResult<WireValue> {
            let marker = next_header(raw, pos)?;
            Ok(match frame {
                Frame::SimpleString(data) => match self.text {
                    Some(policy) => WireValue::Text(decode_text(data, policy)?),
                    None => WireValue::SimpleString(data),
                },
                Frame::BulkString(data) => {
                    *pos += data.len() + 2;
                    match self.text {
                        Some(policy) => WireValue::Text(decode_text(data, policy)?),
                        None => WireValue::BulkString(data),
                    }
                }
                Frame::Error(message) => WireValue::Error(ServerError::new(&*message)),
                Frame::Integer(value) => WireValue::Integer(value),
                Frame::Null if marker == b'*' => WireValue::NullArray,
                Frame::Null => WireValue::Null,
                Frame::Array(items) => WireValue::Array(
                    items
                        .into_iter()
                        .map(|item| self.convert(item, raw, pos))
                        .collect::<ProtocolResult<Vec<_>>>()?,
                ),
            })
        }
    }

    /// Returns the type marker of the header line at `pos` and moves past it.
    fn next_header(raw: &[u8], pos: &mut usize) -> ProtocolResult<u8> {
        let rest = raw.get(*pos..).ok_or(ProtocolError::MissingCrlf)?;
        let end = memmem::find(rest, b"\r\n").ok_or(ProtocolError::MissingCrlf)?;
        let marker = *rest.first().ok_or(ProtocolError::MissingCrlf)?;
        *pos += end + 2;
        Ok(marker)
    }

    impl Protocol for NativeProtocol {
        fn feed(&mut self, data: &[u8]) -> ProtocolResult<()> {
            self.buf.extend_from_slice(data);
            while !self.buf.is_empty() {
                let decoded = decode_mut(&mut self.buf)
                    .map_err(|err| ProtocolError::Native(err.to_string()))?;
                let Some((frame, _, raw)) = decoded else {
                    break;
                };
                let value = self.convert(frame, &raw, &mut 0)?;
                self.ready.push_back(value);
            }
            Ok(())
        }

        fn gets(&mut self) -> Option<WireValue> {
            self.ready.pop_front()
        }

        fn has_data(&self) -> bool {
            !self.ready.is_empty() || !self.buf.is_empty()
        }

        fn reset(&mut self) {
            *self = NativeProtocol::new(self.text);
        }

        fn backend(&self) -> Backend {
            Backend::Native
        }
    }
}
