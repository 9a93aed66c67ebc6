//! Key-value store with lazy millisecond-granularity expiry.
//!
//! One flat namespace of byte-string keys to byte-string values. Every
//! entry optionally carries an absolute expiry instant; expiry is evaluated
//! when the key is next accessed, never by the read path holding state
//! across calls. The [`Store`] is constructed once at process start and
//! shared across connection tasks via `Arc` — it is the only mutable state
//! in the server, and each operation takes its lock exactly once.
//!
//! Time comes from `tokio::time::Instant` so the TTL behavior can be tested
//! against a paused clock.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// A stored value plus its optional absolute expiry.
#[derive(Debug, Clone)]
pub struct Entry {
    pub value: Bytes,
    /// `None` means the key never expires.
    pub expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Bytes, ttl: Option<Duration>) -> Self {
        Self {
            value,
            // Clock sampled at write time, not at enqueue time.
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    /// Whether this entry is expired as of `now`.
    #[inline]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }
}

/// The shared in-memory key-value store.
///
/// A single exclusive lock per operation is sufficient here: no command
/// touches more than one key, so the lock is never held across another
/// key's access and there is nothing to deadlock on.
#[derive(Debug, Default)]
pub struct Store {
    data: RwLock<HashMap<Bytes, Entry>>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Writes `key -> value`, unconditionally replacing any existing entry
    /// (including its expiry). With `Some(ttl)` the entry expires `ttl`
    /// after this call applies the write.
    pub fn set(&self, key: Bytes, value: Bytes, ttl: Option<Duration>) {
        let entry = Entry::new(value, ttl);
        trace!(key = %String::from_utf8_lossy(&key), ttl = ?ttl, "store set");
        self.data.write().unwrap().insert(key, entry);
    }

    /// Reads the value for `key`, or `None` if absent or expired.
    ///
    /// The clock is sampled once at the start of the call; an entry whose
    /// expiry is at or before that sample is treated as absent and removed.
    pub fn get(&self, key: &Bytes) -> Option<Bytes> {
        let now = Instant::now();

        // Fast path: read lock only, for present non-expired keys.
        {
            let data = self.data.read().unwrap();
            match data.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: take the write lock and drop the entry. Another writer
        // may have replaced it in between, so re-check against the same
        // clock sample before removing.
        let mut data = self.data.write().unwrap();
        if let Some(entry) = data.get(key) {
            if entry.is_expired(now) {
                data.remove(key);
                trace!(key = %String::from_utf8_lossy(key), "expired key dropped on access");
                return None;
            }
            return Some(entry.value.clone());
        }
        None
    }

    /// Number of entries currently held, expired-but-unswept ones included.
    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().unwrap().is_empty()
    }

    /// Removes every expired entry, returning how many were dropped.
    /// Used by the optional background sweeper; correctness never depends
    /// on it because `get` checks expiry on access.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut data = self.data.write().unwrap();
        let before = data.len();
        data.retain(|_, entry| !entry.is_expired(now));
        before - data.len()
    }
}
