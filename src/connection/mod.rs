//! Client connection management.
//!
//! One tokio task per accepted socket. The task owns the socket and the
//! accumulation buffer; the core (codec, dispatcher, store) is invoked
//! synchronously from inside it and never blocks or suspends — all waiting
//! happens here, on socket reads and writes.

pub mod handler;

pub use handler::{handle_connection, Connection, ConnectionError, ConnectionStats};
