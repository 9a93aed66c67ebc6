//! Command routing layer.
//!
//! Decoded request values flow in from the protocol module, get resolved
//! against a static [`CommandTable`] (niladic vs. variadic arity classes),
//! and come back out as reply values:
//!
//! ```text
//! RespValue (request)
//!       │
//!       ▼
//! ┌─────────────┐     lookup      ┌──────────────┐
//! │ Dispatcher  │───────────────> │ CommandTable │
//! └──────┬──────┘                 └──────────────┘
//!        │ invoke handler
//!        ▼
//! ┌─────────────┐
//! │    Store    │   (SET / GET only)
//! └─────────────┘
//! ```
//!
//! Built-ins: `PING`, `ECHO`, `SET key value [PX ms]`, `GET key`.

pub mod dispatch;
pub mod table;

pub use dispatch::Dispatcher;
pub use table::{CommandTable, NiladicHandler, VariadicHandler};
