//! RESP wire protocol support.
//!
//! Two halves, mirroring the data flow through the server:
//!
//! - `types`: the [`RespValue`] enum and its serialization into wire bytes.
//! - `parser`: the incremental decoder that turns buffered socket input
//!   into one [`RespValue`] per complete frame.
//!
//! Decode is pure and non-blocking; the connection layer owns framing and
//! re-invokes the parser as more bytes arrive.

pub mod parser;
pub mod types;

pub use parser::{parse_frame, ParseError, ParseResult, RespParser};
pub use types::RespValue;
