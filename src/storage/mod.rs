//! In-memory storage.
//!
//! - `store`: the shared [`Store`] — a lock-guarded map of key to value
//!   with lazy, access-time expiry.
//! - `sweeper`: an optional background task that reclaims expired entries
//!   so memory does not grow unboundedly for keys never read again.

pub mod store;
pub mod sweeper;

pub use store::{Entry, Store};
pub use sweeper::{start_sweeper, Sweeper, DEFAULT_SWEEP_INTERVAL};
