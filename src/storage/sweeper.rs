//! Optional background expiry sweep.
//!
//! Lazy expiry alone means a key that expires and is never read again stays
//! resident forever. The sweeper is a small additive extension that bounds
//! that: a background task periodically calls [`Store::purge_expired`].
//! The access-time check in `Store::get` remains the source of truth —
//! nothing observes an expired value even with the sweeper disabled.

use crate::storage::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Default pause between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to a running sweeper task. Dropping the handle stops the task.
#[derive(Debug)]
pub struct Sweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl Sweeper {
    /// Spawns the sweep loop on the current runtime.
    pub fn start(store: Arc<Store>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(sweep_loop(store, interval, shutdown_rx));
        info!(interval_ms = interval.as_millis() as u64, "expiry sweeper started");
        Self { shutdown_tx }
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweep_loop(store: Arc<Store>, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("expiry sweeper shutting down");
                    return;
                }
            }
        }

        let dropped = store.purge_expired();
        if dropped > 0 {
            debug!(dropped, remaining = store.len(), "swept expired keys");
        }
    }
}

/// Starts the sweeper with the default interval.
pub fn start_sweeper(store: Arc<Store>) -> Sweeper {
    Sweeper::start(store, DEFAULT_SWEEP_INTERVAL)
}
