//! Incremental RESP frame decoder.
//!
//! The parser is a pure function over an already-buffered byte slice: it
//! never performs I/O and never blocks. Framing is the connection layer's
//! job — it appends each socket read to an accumulation buffer and calls
//! [`RespParser::parse`], which returns:
//!
//! - `Ok(Some((value, consumed)))` — one complete frame was decoded and
//!   occupied `consumed` bytes; the caller advances its buffer by that much.
//! - `Ok(None)` — the buffer holds a prefix of a frame; read more bytes and
//!   try again. A command split across two socket reads is therefore
//!   reassembled rather than dropped.
//! - `Err(ParseError)` — the bytes cannot be a valid frame.
//!
//! Bulk string payloads are sliced to exactly their declared length, so
//! embedded CRLF or NUL bytes pass through untouched. A declared length
//! that does not line up with a trailing CRLF is a protocol error.

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use std::num::ParseIntError;
use thiserror::Error;

/// Errors produced while decoding RESP frames.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// The leading byte is not `+`, `-`, `$` or `*`.
    #[error("unsupported RESP type: {0:#04x}")]
    UnsupportedType(u8),

    /// A length or count token is not a decimal integer.
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Simple string or error text is not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative (and not the -1 nil marker).
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array count is negative (and not the -1 nil marker).
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Framing violation, e.g. a bulk payload not followed by CRLF at its
    /// declared length.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Declared bulk length exceeds the size cap.
    #[error("bulk string too large: {size} bytes (max: {max})")]
    BulkTooLarge { size: usize, max: usize },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum accepted bulk string payload (512 MB, same cap as Redis).
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array nesting depth.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Stateless-per-frame RESP decoder.
#[derive(Debug, Default)]
pub struct RespParser {
    depth: usize,
}

impl RespParser {
    pub fn new() -> Self {
        Self { depth: 0 }
    }

    /// Attempts to decode one complete frame from the front of `buf`.
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        self.depth = 0;
        self.parse_value(buf)
    }

    fn parse_value(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        if self.depth > MAX_NESTING_DEPTH {
            return Err(ParseError::Protocol(format!(
                "maximum nesting depth exceeded: {}",
                MAX_NESTING_DEPTH
            )));
        }

        match buf[0] {
            prefix::SIMPLE_STRING => self.parse_line(buf, RespValue::SimpleString),
            prefix::ERROR => self.parse_line(buf, RespValue::Error),
            prefix::BULK_STRING => self.parse_bulk_string(buf),
            prefix::ARRAY => self.parse_array(buf),
            other => Err(ParseError::UnsupportedType(other)),
        }
    }

    /// Decodes a CRLF-terminated text line: `+<text>\r\n` or `-<text>\r\n`.
    fn parse_line(
        &mut self,
        buf: &[u8],
        make: fn(String) -> RespValue,
    ) -> ParseResult<Option<(RespValue, usize)>> {
        match find_crlf(&buf[1..]) {
            Some(pos) => {
                let text = std::str::from_utf8(&buf[1..1 + pos])
                    .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
                // 1 prefix byte + text + CRLF
                Ok(Some((make(text.to_string()), 1 + pos + 2)))
            }
            None => Ok(None),
        }
    }

    /// Decodes `$<len>\r\n<payload>\r\n`, slicing exactly `len` payload bytes.
    fn parse_bulk_string(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let length_end = match find_crlf(&buf[1..]) {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let length = parse_decimal(&buf[1..1 + length_end])?;

        // $-1\r\n is the nil bulk string
        if length == -1 {
            return Ok(Some((RespValue::Null, 1 + length_end + 2)));
        }
        if length < 0 {
            return Err(ParseError::InvalidBulkLength(length));
        }

        let length = length as usize;
        if length > MAX_BULK_SIZE {
            return Err(ParseError::BulkTooLarge {
                size: length,
                max: MAX_BULK_SIZE,
            });
        }

        let data_start = 1 + length_end + 2;
        let total_needed = data_start + length + 2;
        if buf.len() < total_needed {
            return Ok(None);
        }

        // The declared length must land exactly on a CRLF, otherwise the
        // length prefix and the payload disagree.
        if &buf[data_start + length..data_start + length + 2] != CRLF {
            return Err(ParseError::Protocol(
                "bulk string length does not match payload".to_string(),
            ));
        }

        let data = Bytes::copy_from_slice(&buf[data_start..data_start + length]);
        Ok(Some((RespValue::BulkString(data), total_needed)))
    }

    /// Decodes `*<count>\r\n` followed by `count` sub-elements.
    fn parse_array(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let count_end = match find_crlf(&buf[1..]) {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let count = parse_decimal(&buf[1..1 + count_end])?;

        if count == -1 {
            return Ok(Some((RespValue::Null, 1 + count_end + 2)));
        }
        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        let count = count as usize;
        let mut elements = Vec::with_capacity(count);
        let mut consumed = 1 + count_end + 2;

        self.depth += 1;

        // Fewer sub-elements than declared is incomplete input, not an
        // error: the rest of the frame may still be in flight.
        for _ in 0..count {
            if consumed >= buf.len() {
                return Ok(None);
            }
            match self.parse_value(&buf[consumed..])? {
                Some((value, element_consumed)) => {
                    elements.push(value);
                    consumed += element_consumed;
                }
                None => return Ok(None),
            }
        }

        self.depth -= 1;

        Ok(Some((RespValue::Array(elements), consumed)))
    }
}

fn parse_decimal(token: &[u8]) -> ParseResult<i64> {
    let s = std::str::from_utf8(token).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
    s.parse()
        .map_err(|e: ParseIntError| ParseError::InvalidInteger(e.to_string()))
}

/// Position of the first `\r` of a CRLF pair, if one is present.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

/// Decodes a single frame from `buf` with a fresh parser.
pub fn parse_frame(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    RespParser::new().parse(buf)
}
