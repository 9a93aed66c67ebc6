//! # emberkv
//!
//! A small in-memory key-value server speaking a subset of the Redis wire
//! protocol (RESP2). Any Redis client can talk to it:
//!
//! ```text
//! $ redis-cli -p 6379
//! 127.0.0.1:6379> PING
//! PONG
//! 127.0.0.1:6379> SET session abc123 PX 60000
//! OK
//! 127.0.0.1:6379> GET session
//! "abc123"
//! ```
//!
//! ## Data flow
//!
//! ```text
//! bytes ──> RespParser ──> Dispatcher ──> CommandTable / Store
//!                              │
//! bytes <── serialize  <── RespValue (reply)
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: RESP value type, serialization, incremental decoder
//! - [`commands`]: static command table and the dispatcher
//! - [`storage`]: shared store with lazy TTL expiry, optional sweeper
//! - [`connection`]: per-connection read/dispatch/write loop
//!
//! Command surface: `PING`, `ECHO <msg>`, `SET <key> <value> [PX <ms>]`,
//! `GET <key>`. Command names are case-insensitive; keys and values are
//! binary-safe and case-sensitive. There is exactly one piece of shared
//! mutable state, the [`storage::Store`], constructed once in `main` and
//! handed to every connection task behind an `Arc`.

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

pub use commands::{CommandTable, Dispatcher};
pub use connection::{handle_connection, ConnectionError, ConnectionStats};
pub use protocol::{parse_frame, ParseError, RespParser, RespValue};
pub use storage::{start_sweeper, Store, Sweeper};

/// Default port (same as Redis).
pub const DEFAULT_PORT: u16 = 6379;

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
