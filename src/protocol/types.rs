//! RESP2 value type and wire serialization.
//!
//! The server speaks a deliberately small subset of RESP: simple strings,
//! bulk strings, arrays of bulk strings, error replies, and the nil bulk
//! string. Every frame is prefixed with a type byte and terminated with
//! CRLF:
//!
//! - Simple string: `+OK\r\n`
//! - Error: `-ERR unknown command 'foo'\r\n`
//! - Bulk string: `$5\r\nhello\r\n`
//! - Array: `*2\r\n$4\r\nECHO\r\n$3\r\nhey\r\n`
//! - Nil bulk string: `$-1\r\n`
//!
//! Integers, inline commands and all RESP3 types are out of scope.

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used between RESP tokens.
pub const CRLF: &[u8] = b"\r\n";

/// RESP type prefix bytes.
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A single RESP value, used both for decoded requests and for replies.
///
/// Command handlers construct replies as `RespValue` and the connection
/// layer serializes them, so there is exactly one encode path: a value
/// either carries its framing already (by being a variant of this enum) or
/// it does not exist. Bare reply text like `PONG` becomes a
/// [`RespValue::SimpleString`] at construction time and is therefore
/// wrapped exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Non-binary-safe text without embedded CRLF. Format: `+<text>\r\n`
    SimpleString(String),

    /// An error reply. Format: `-<message>\r\n`
    Error(String),

    /// Length-prefixed, binary-safe byte string.
    /// Format: `$<len>\r\n<payload>\r\n`
    BulkString(Bytes),

    /// The nil bulk string `$-1\r\n`, the reply for an absent or expired key.
    Null,

    /// An ordered sequence of values. On the request path this is always a
    /// command invocation: element 0 is the name, the rest are arguments.
    Array(Vec<RespValue>),
}

impl RespValue {
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    pub fn null() -> Self {
        RespValue::Null
    }

    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(values)
    }

    /// The canonical `+OK\r\n` success reply.
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    /// The canonical `+PONG\r\n` reply.
    pub fn pong() -> Self {
        RespValue::SimpleString("PONG".to_string())
    }

    /// Serializes this value into its wire representation.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes into an existing buffer, avoiding a fresh allocation when
    /// several replies are written back to back.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => {
                buf.push(prefix::SIMPLE_STRING);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::Error(s) => {
                buf.push(prefix::ERROR);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::BulkString(data) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            RespValue::Null => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(b"-1");
                buf.extend_from_slice(CRLF);
            }
            RespValue::Array(values) => {
                buf.push(prefix::ARRAY);
                buf.extend_from_slice(values.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for value in values {
                    value.serialize_into(buf);
                }
            }
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Extracts the text of a SimpleString or UTF-8 BulkString.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RespValue::SimpleString(s) => Some(s),
            RespValue::BulkString(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Extracts the payload of a BulkString.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            RespValue::BulkString(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "\"{}\"", s),
            RespValue::Error(s) => write!(f, "(error) {}", s),
            RespValue::BulkString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "(binary data, {} bytes)", data.len()),
            },
            RespValue::Null => write!(f, "(nil)"),
            RespValue::Array(values) => {
                if values.is_empty() {
                    write!(f, "(empty array)")
                } else {
                    writeln!(f)?;
                    for (i, v) in values.iter().enumerate() {
                        writeln!(f, "{}) {}", i + 1, v)?;
                    }
                    Ok(())
                }
            }
        }
    }
}
