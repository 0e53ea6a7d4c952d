//! Background expiry sweeping.
//!
//! One spawned task wakes every cache-TTL period and asks the store for a
//! sweep pass, deleting records whose expiry has passed. The sweeper never
//! touches the in-memory cache: entries for reaped records idle-expire on
//! their own.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time;

use crate::store::ContentStore;

/// Spawns the sweep loop. Runs for the life of the process.
pub fn spawn(store: Arc<ContentStore>, interval: Duration) {
    tokio::spawn(async move {
        let mut tick = time::interval(interval);
        tick.tick().await; // the first tick completes immediately
        loop {
            tick.tick().await;
            match store.sweep(Utc::now().timestamp_millis()).await {
                Ok(stats) => {
                    tracing::debug!(
                        scanned = stats.scanned,
                        deleted = stats.deleted,
                        "expiry sweep complete"
                    );
                }
                Err(err) => {
                    tracing::warn!(error = %err, "expiry sweep failed");
                }
            }
        }
    });
}
