//! # Wire Types
//!
//! Purpose: Model RESP2 replies and outgoing command arguments.
//!
//! ## Design Principles
//! 1. **Binary-Safe**: Strings are `Bytes` unless a text policy asks otherwise.
//! 2. **Distinct Nulls**: `$-1` and `*-1` are separate variants, and neither
//!    compares equal to an empty value.
//! 3. **Typed Arguments**: The argument enum replaces runtime type checks; the
//!    only argument that cannot be encoded is an explicit `Nil`.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// One decoded RESP value.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// `+OK`
    SimpleString(Bytes),
    /// `-ERR message`
    Error(ServerError),
    /// `:1000`
    Integer(i64),
    /// `$6\r\nfoobar`
    BulkString(Bytes),
    /// `$-1`
    Null,
    /// `*N` followed by N values.
    Array(Vec<WireValue>),
    /// `*-1`
    NullArray,
    /// Simple or bulk string decoded under a [`Utf8Policy`].
    Text(String),
}

impl WireValue {
    pub fn is_error(&self) -> bool {
        matches!(self, WireValue::Error(_))
    }

    /// True for both null markers.
    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Null | WireValue::NullArray)
    }

    /// Payload of a simple, bulk or text string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            WireValue::SimpleString(data) | WireValue::BulkString(data) => Some(data),
            WireValue::Text(text) => Some(text.as_bytes()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            WireValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[WireValue]> {
        match self {
            WireValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<WireValue>> {
        match self {
            WireValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Converts an in-band error reply into `Err`.
    pub fn into_result(self) -> Result<WireValue, ServerError> {
        match self {
            WireValue::Error(err) => Err(err),
            other => Ok(other),
        }
    }
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        WireValue::BulkString(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<i64> for WireValue {
    fn from(value: i64) -> Self {
        WireValue::Integer(value)
    }
}

impl From<ServerError> for WireValue {
    fn from(err: ServerError) -> Self {
        WireValue::Error(err)
    }
}

/// How string payloads are turned into text.
///
/// Without a policy, payloads stay raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Utf8Policy {
    /// Invalid UTF-8 is a protocol error.
    Strict,
    /// Invalid sequences become U+FFFD.
    Replace,
}

impl Utf8Policy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "strict" => Some(Utf8Policy::Strict),
            "replace" | "lossy" => Some(Utf8Policy::Replace),
            _ => None,
        }
    }
}

/// One argument of an outgoing command.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Bytes(Bytes),
    Str(String),
    Int(i64),
    Float(f64),
    /// Rejected at encode time.
    Nil,
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Bytes(data) => write!(f, "{}", String::from_utf8_lossy(data)),
            Arg::Str(text) => f.write_str(text),
            Arg::Int(value) => write!(f, "{}", value),
            Arg::Float(value) => write!(f, "{}", value),
            Arg::Nil => f.write_str("nil"),
        }
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_owned())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value)
    }
}

impl From<&String> for Arg {
    fn from(value: &String) -> Self {
        Arg::Str(value.clone())
    }
}

impl From<&[u8]> for Arg {
    fn from(value: &[u8]) -> Self {
        Arg::Bytes(Bytes::copy_from_slice(value))
    }
}

impl<const N: usize> From<&[u8; N]> for Arg {
    fn from(value: &[u8; N]) -> Self {
        Arg::Bytes(Bytes::copy_from_slice(value))
    }
}

impl From<Vec<u8>> for Arg {
    fn from(value: Vec<u8>) -> Self {
        Arg::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for Arg {
    fn from(value: Bytes) -> Self {
        Arg::Bytes(value)
    }
}

macro_rules! impl_int_arg {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::Int(value as i64)
                }
            }
        )*
    };
}

impl_int_arg!(i8, i16, i32, i64, u8, u16, u32, isize);

impl From<u64> for Arg {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(value) => Arg::Int(value),
            Err(_) => Arg::Str(value.to_string()),
        }
    }
}

impl From<usize> for Arg {
    fn from(value: usize) -> Self {
        Arg::from(value as u64)
    }
}

impl From<f32> for Arg {
    fn from(value: f32) -> Self {
        Arg::Float(value as f64)
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => Arg::Nil,
        }
    }
}

/// A command name and its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    args: Vec<Arg>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Command {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, A>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        Command {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// True when the name matches `other` ignoring ASCII case.
    pub fn is(&self, other: &str) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }
}
