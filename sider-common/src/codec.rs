//! # RESP2 Encoding and Incremental Decoding
//!
//! Purpose: Encode client commands and decode server replies from a byte
//! stream that may arrive in arbitrary chunks.
//!
//! ## Design Principles
//! 1. **Resumable Parsing**: Array progress lives in an explicit frame stack,
//!    so a reply split across reads never re-parses finished elements.
//! 2. **Buffer Reuse**: Callers own the input and output buffers.
//! 3. **Binary-Safe**: Bulk strings are length-prefixed raw bytes.
//! 4. **Fail Fast**: Invalid framing returns protocol errors immediately.
//! 5. **Atomic Encoding**: A command that fails to encode leaves no bytes
//!    behind in the output buffer.

use bytes::{Bytes, BytesMut};
use memchr::memmem;

use crate::error::{EncodeError, ProtocolError, ProtocolResult, ServerError};
use crate::types::{Arg, Command, Utf8Policy, WireValue};

const CRLF: &[u8] = b"\r\n";

/// Encodes `name args...` as a RESP2 array of bulk strings into `out`.
///
/// On error `out` is restored to its original length.
pub fn encode_command(name: &str, args: &[Arg], out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let start = out.len();
    out.push(b'*');
    push_usize(out, args.len() + 1);
    out.extend_from_slice(CRLF);
    push_bulk(out, name.as_bytes());

    for (index, arg) in args.iter().enumerate() {
        match arg {
            Arg::Bytes(data) => push_bulk(out, data),
            Arg::Str(text) => push_bulk(out, text.as_bytes()),
            Arg::Int(value) => {
                let mut digits = Vec::with_capacity(20);
                push_i64(&mut digits, *value);
                push_bulk(out, &digits);
            }
            Arg::Float(value) => push_bulk(out, value.to_string().as_bytes()),
            Arg::Nil => {
                out.truncate(start);
                return Err(EncodeError::NullArgument {
                    command: name.to_owned(),
                    index,
                });
            }
        }
    }
    Ok(())
}

/// Encodes a [`Command`] into `out`.
pub fn encode(cmd: &Command, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    encode_command(cmd.name(), cmd.args(), out)
}

/// Encodes a command into a fresh buffer.
pub fn make_cmd(name: &str, args: &[Arg]) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(16 + name.len() + args.len() * 16);
    encode_command(name, args, &mut out)?;
    Ok(out)
}

/// Outcome of one decode attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Complete(WireValue),
    Incomplete,
}

#[derive(Debug)]
struct Frame {
    expected: usize,
    items: Vec<WireValue>,
}

enum Token {
    Value(WireValue),
    ArrayStart(usize),
}

/// Incremental RESP2 decoder.
///
/// Consumes complete tokens from the front of the caller's buffer. Scalars
/// that are only partly buffered are left in place and re-scanned on the
/// next call.
#[derive(Debug, Default)]
pub struct Decoder {
    frames: Vec<Frame>,
    text: Option<Utf8Policy>,
}

impl Decoder {
    pub fn new(text: Option<Utf8Policy>) -> Self {
        Decoder {
            frames: Vec::new(),
            text,
        }
    }

    pub fn text_policy(&self) -> Option<Utf8Policy> {
        self.text
    }

    /// True while an array reply is partially assembled.
    pub fn in_progress(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Drops any partially assembled reply.
    pub fn reset(&mut self) {
        self.frames.clear();
    }

    /// Decodes at most one top-level value from the front of `buf`.
    pub fn decode(&mut self, buf: &mut BytesMut) -> ProtocolResult<Decoded> {
        loop {
            let value = match self.next_token(buf)? {
                None => return Ok(Decoded::Incomplete),
                Some(Token::ArrayStart(expected)) => {
                    self.frames.push(Frame {
                        expected,
                        items: Vec::with_capacity(expected.min(1024)),
                    });
                    continue;
                }
                Some(Token::Value(value)) => value,
            };
            if let Some(done) = self.absorb(value) {
                return Ok(Decoded::Complete(done));
            }
        }
    }

    /// Pushes a finished value into the innermost open array, closing every
    /// array it completes. Returns the value once nothing is left open.
    fn absorb(&mut self, mut value: WireValue) -> Option<WireValue> {
        while let Some(frame) = self.frames.last_mut() {
            frame.items.push(value);
            if frame.items.len() < frame.expected {
                return None;
            }
            let items = std::mem::take(&mut frame.items);
            self.frames.pop();
            value = WireValue::Array(items);
        }
        Some(value)
    }

    fn next_token(&self, buf: &mut BytesMut) -> ProtocolResult<Option<Token>> {
        let Some(&marker) = buf.first() else {
            return Ok(None);
        };
        let Some(line_end) = memmem::find(&buf[..], CRLF) else {
            if !matches!(marker, b'+' | b'-' | b':' | b'$' | b'*') {
                return Err(ProtocolError::InvalidTypeMarker(marker));
            }
            return Ok(None);
        };

        match marker {
            b'+' => {
                let line = take_line(buf, line_end);
                Ok(Some(Token::Value(self.string_value(line, false)?)))
            }
            b'-' => {
                let line = take_line(buf, line_end);
                let message = String::from_utf8_lossy(&line).into_owned();
                Ok(Some(Token::Value(WireValue::Error(ServerError::new(message)))))
            }
            b':' => {
                let value = parse_i64(&buf[1..line_end])?;
                let _ = buf.split_to(line_end + 2);
                Ok(Some(Token::Value(WireValue::Integer(value))))
            }
            b'$' => {
                let len = parse_i64(&buf[1..line_end])?;
                if len == -1 {
                    let _ = buf.split_to(line_end + 2);
                    return Ok(Some(Token::Value(WireValue::Null)));
                }
                if len < -1 {
                    return Err(ProtocolError::InvalidBulkLength(len));
                }
                let len = usize::try_from(len).map_err(|_| ProtocolError::InvalidBulkLength(len))?;
                let payload_start = line_end + 2;
                let frame_end = payload_start + len + 2;
                if buf.len() < frame_end {
                    return Ok(None);
                }
                if &buf[frame_end - 2..frame_end] != CRLF {
                    return Err(ProtocolError::MissingCrlf);
                }
                let mut frame = buf.split_to(frame_end);
                let _ = frame.split_to(payload_start);
                frame.truncate(len);
                Ok(Some(Token::Value(self.string_value(frame.freeze(), true)?)))
            }
            b'*' => {
                let len = parse_i64(&buf[1..line_end])?;
                let _ = buf.split_to(line_end + 2);
                match len {
                    -1 => Ok(Some(Token::Value(WireValue::NullArray))),
                    0 => Ok(Some(Token::Value(WireValue::Array(Vec::new())))),
                    n if n < -1 => Err(ProtocolError::InvalidArrayLength(n)),
                    n => usize::try_from(n)
                        .map(|n| Some(Token::ArrayStart(n)))
                        .map_err(|_| ProtocolError::InvalidArrayLength(n)),
                }
            }
            other => Err(ProtocolError::InvalidTypeMarker(other)),
        }
    }

    fn string_value(&self, data: Bytes, bulk: bool) -> ProtocolResult<WireValue> {
        match self.text {
            None if bulk => Ok(WireValue::BulkString(data)),
            None => Ok(WireValue::SimpleString(data)),
            Some(policy) => decode_text(data, policy).map(WireValue::Text),
        }
    }
}

/// Applies a text policy to a string payload.
pub fn decode_text(data: Bytes, policy: Utf8Policy) -> ProtocolResult<String> {
    match policy {
        Utf8Policy::Strict => String::from_utf8(data.to_vec())
            .map_err(|err| ProtocolError::InvalidUtf8(err.utf8_error().to_string())),
        Utf8Policy::Replace => Ok(String::from_utf8_lossy(&data).into_owned()),
    }
}

/// Splits off `<marker><line>\r\n` and returns the line without marker or CRLF.
fn take_line(buf: &mut BytesMut, line_end: usize) -> Bytes {
    let mut line = buf.split_to(line_end + 2);
    line.truncate(line_end);
    let _ = line.split_to(1);
    line.freeze()
}

fn parse_i64(data: &[u8]) -> ProtocolResult<i64> {
    let invalid = || ProtocolError::InvalidInteger(String::from_utf8_lossy(data).into_owned());
    let (negative, digits) = match data.split_first() {
        Some((b'-', rest)) => (true, rest),
        Some(_) => (false, data),
        None => return Err(invalid()),
    };
    if digits.is_empty() {
        return Err(invalid());
    }

    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(invalid());
        }
        let digit = (b - b'0') as i64;
        value = value
            .checked_mul(10)
            .and_then(|v| if negative { v.checked_sub(digit) } else { v.checked_add(digit) })
            .ok_or_else(invalid)?;
    }
    Ok(value)
}

fn push_bulk(out: &mut Vec<u8>, data: &[u8]) {
    out.push(b'$');
    push_usize(out, data.len());
    out.extend_from_slice(CRLF);
    out.extend_from_slice(data);
    out.extend_from_slice(CRLF);
}

fn push_i64(out: &mut Vec<u8>, value: i64) {
    if value < 0 {
        out.push(b'-');
    }
    push_u64(out, value.unsigned_abs());
}

fn push_usize(out: &mut Vec<u8>, value: usize) {
    push_u64(out, value as u64);
}

fn push_u64(out: &mut Vec<u8>, mut value: u64) {
    let mut buf = [0u8; 20];
    let mut len = 0;
    loop {
        buf[len] = b'0' + (value % 10) as u8;
        value /= 10;
        len += 1;
        if value == 0 {
            break;
        }
    }
    out.extend(buf[..len].iter().rev());
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn decode_all(decoder: &mut Decoder, buf: &mut BytesMut) -> Vec<WireValue> {
        let mut out = Vec::new();
        while let Decoded::Complete(value) = decoder.decode(buf).unwrap() {
            out.push(value);
        }
        out
    }

    fn bulk(data: &'static [u8]) -> WireValue {
        WireValue::BulkString(Bytes::from_static(data))
    }

    #[rstest]
    #[case("set", vec![Arg::from("key"), Arg::from("value")], &b"*3\r\n$3\r\nset\r\n$3\r\nkey\r\n$5\r\nvalue\r\n"[..])]
    #[case("set", vec![Arg::from("key"), Arg::from(1i32)], &b"*3\r\n$3\r\nset\r\n$3\r\nkey\r\n$1\r\n1\r\n"[..])]
    #[case("ping", vec![], &b"*1\r\n$4\r\nping\r\n"[..])]
    #[case("incrby", vec![Arg::from("n"), Arg::from(-42i64)], &b"*3\r\n$6\r\nincrby\r\n$1\r\nn\r\n$3\r\n-42\r\n"[..])]
    #[case("incrbyfloat", vec![Arg::from("n"), Arg::from(1.5f64)], &b"*3\r\n$11\r\nincrbyfloat\r\n$1\r\nn\r\n$3\r\n1.5\r\n"[..])]
    #[case("set", vec![Arg::from(&b"k\r\n"[..]), Arg::from(Vec::<u8>::new())], &b"*3\r\n$3\r\nset\r\n$3\r\nk\r\n\r\n$0\r\n\r\n"[..])]
    fn encodes_commands(#[case] name: &str, #[case] args: Vec<Arg>, #[case] expected: &[u8]) {
        assert_eq!(make_cmd(name, &args).unwrap(), expected);
    }

    #[test]
    fn encodes_extreme_integers() {
        let out = make_cmd("x", &[Arg::Int(i64::MIN)]).unwrap();
        assert_eq!(out, b"*2\r\n$1\r\nx\r\n$20\r\n-9223372036854775808\r\n");
    }

    #[test]
    fn null_argument_leaves_buffer_untouched() {
        let mut out = b"*1\r\n$4\r\nPING\r\n".to_vec();
        let err = encode_command("set", &[Arg::from("key"), Arg::Nil], &mut out).unwrap_err();
        assert_eq!(
            err,
            EncodeError::NullArgument {
                command: "set".into(),
                index: 1
            }
        );
        assert_eq!(out, b"*1\r\n$4\r\nPING\r\n");
    }

    #[test]
    fn encodes_command_struct() {
        let mut out = Vec::new();
        encode(&Command::new("GET").arg("key"), &mut out).unwrap();
        assert_eq!(out, b"*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n");
    }

    #[test]
    fn decodes_every_reply_kind() {
        let mut decoder = Decoder::default();
        let mut buf = BytesMut::from(
            &b"+OK\r\n-ERR bad\r\n:-12\r\n$5\r\nhello\r\n$-1\r\n$0\r\n\r\n*-1\r\n*0\r\n"[..],
        );
        let values = decode_all(&mut decoder, &mut buf);
        assert_eq!(
            values,
            vec![
                WireValue::SimpleString(Bytes::from_static(b"OK")),
                WireValue::Error(ServerError::new("ERR bad")),
                WireValue::Integer(-12),
                bulk(b"hello"),
                WireValue::Null,
                bulk(b""),
                WireValue::NullArray,
                WireValue::Array(Vec::new()),
            ]
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn error_marker_differs_from_simple_string() {
        let mut decoder = Decoder::default();
        let mut buf = BytesMut::from(&b"-Err\r\n+Err\r\n"[..]);
        let values = decode_all(&mut decoder, &mut buf);
        assert!(values[0].is_error());
        assert!(!values[1].is_error());
    }

    #[test]
    fn decodes_nested_arrays() {
        let mut decoder = Decoder::default();
        let mut buf = BytesMut::from(&b"*2\r\n*2\r\n:1\r\n$1\r\na\r\n*1\r\n*-1\r\n"[..]);
        let values = decode_all(&mut decoder, &mut buf);
        assert_eq!(
            values,
            vec![WireValue::Array(vec![
                WireValue::Array(vec![WireValue::Integer(1), bulk(b"a")]),
                WireValue::Array(vec![WireValue::NullArray]),
            ])]
        );
        assert!(!decoder.in_progress());
    }

    #[test]
    fn byte_at_a_time_matches_one_shot() {
        let wire: &[u8] =
            b"*3\r\n$7\r\nmessage\r\n$2\r\nch\r\n$11\r\nhello world\r\n:7\r\n+PONG\r\n*2\r\n$-1\r\n*0\r\n";

        let mut whole = BytesMut::from(wire);
        let expected = decode_all(&mut Decoder::default(), &mut whole);

        let mut decoder = Decoder::default();
        let mut buf = BytesMut::new();
        let mut got = Vec::new();
        for byte in wire {
            buf.extend_from_slice(&[*byte]);
            got.extend(decode_all(&mut decoder, &mut buf));
        }
        assert_eq!(got, expected);
        assert_eq!(got.len(), 4);
    }

    #[test]
    fn partial_array_keeps_finished_elements() {
        let mut decoder = Decoder::default();
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nfoo\r\n$3\r\nba"[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap(), Decoded::Incomplete);
        assert!(decoder.in_progress());
        // Only the blocked bulk string stays buffered.
        assert_eq!(&buf[..], b"$3\r\nba");

        buf.extend_from_slice(b"r\r\n");
        assert_eq!(
            decoder.decode(&mut buf).unwrap(),
            Decoded::Complete(WireValue::Array(vec![bulk(b"foo"), bulk(b"bar")]))
        );
    }

    #[test]
    fn empty_buffer_is_incomplete() {
        let mut decoder = Decoder::default();
        assert_eq!(decoder.decode(&mut BytesMut::new()).unwrap(), Decoded::Incomplete);
    }

    #[rstest]
    #[case(&b"?x\r\n"[..], ProtocolError::InvalidTypeMarker(b'?'))]
    #[case(&b"!"[..], ProtocolError::InvalidTypeMarker(b'!'))]
    #[case(&b":12a\r\n"[..], ProtocolError::InvalidInteger("12a".into()))]
    #[case(&b"$\r\n"[..], ProtocolError::InvalidInteger("".into()))]
    #[case(&b"$-5\r\n"[..], ProtocolError::InvalidBulkLength(-5))]
    #[case(&b"*-2\r\n"[..], ProtocolError::InvalidArrayLength(-2))]
    #[case(&b"$3\r\nfooXY"[..], ProtocolError::MissingCrlf)]
    fn corruption_is_reported(#[case] wire: &[u8], #[case] expected: ProtocolError) {
        let mut decoder = Decoder::default();
        let mut buf = BytesMut::from(wire);
        assert_eq!(decoder.decode(&mut buf).unwrap_err(), expected);
    }

    #[test]
    fn text_policies() {
        let mut strict = Decoder::new(Some(Utf8Policy::Strict));
        let mut buf = BytesMut::from(&b"$2\r\nhi\r\n+OK\r\n"[..]);
        assert_eq!(
            decode_all(&mut strict, &mut buf),
            vec![WireValue::Text("hi".into()), WireValue::Text("OK".into())]
        );

        let mut buf = BytesMut::from(&b"$2\r\n\xff\xfe\r\n"[..]);
        assert!(matches!(
            strict.decode(&mut buf),
            Err(ProtocolError::InvalidUtf8(_))
        ));

        let mut lossy = Decoder::new(Some(Utf8Policy::Replace));
        let mut buf = BytesMut::from(&b"$1\r\n\xff\r\n"[..]);
        assert_eq!(
            lossy.decode(&mut buf).unwrap(),
            Decoded::Complete(WireValue::Text("\u{fffd}".into()))
        );
    }
}
