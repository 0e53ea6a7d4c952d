//! Asynchronous access logging.
//!
//! Handlers never format or emit access entries inline: they push a record
//! onto an unbounded channel and move on. A single spawned worker drains the
//! channel and emits one tracing event per entry under the
//! `bytedrop::access` target, so entries come out in completion order and a
//! slow logging sink cannot stall a request.

use std::net::IpAddr;

use tokio::sync::mpsc;

/// One access-log record, queued by a handler.
#[derive(Debug)]
pub enum AccessEntry {
    /// A successful upload, recorded at the point the 201 is about to go out.
    Post {
        key: String,
        media_type: String,
        ip: IpAddr,
        user_agent: Option<String>,
        /// Size of the body as accepted (pre-deferred-compression).
        size: usize,
        /// True when compression was deferred to the save driver.
        deferred_compression: bool,
    },
    /// A content read that found a record.
    Read {
        key: String,
        ip: IpAddr,
        user_agent: Option<String>,
    },
}

/// Handle for queueing access entries onto the logging worker.
#[derive(Clone)]
pub struct AccessLog {
    tx: mpsc::UnboundedSender<AccessEntry>,
}

impl AccessLog {
    /// Spawns the worker task and returns the queue handle.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                emit(entry);
            }
        });
        Self { tx }
    }

    /// Queues one entry. Never blocks; if the worker is gone the entry is
    /// silently discarded.
    pub fn record(&self, entry: AccessEntry) {
        let _ = self.tx.send(entry);
    }
}

fn emit(entry: AccessEntry) {
    match entry {
        AccessEntry::Post {
            key,
            media_type,
            ip,
            user_agent,
            size,
            deferred_compression,
        } => {
            tracing::info!(
                target: "bytedrop::access",
                key = %key,
                media_type = %media_type,
                ip = %ip,
                user_agent = user_agent.as_deref().unwrap_or("-"),
                size,
                deferred_compression,
                "post"
            );
        }
        AccessEntry::Read { key, ip, user_agent } => {
            tracing::info!(
                target: "bytedrop::access",
                key = %key,
                ip = %ip,
                user_agent = user_agent.as_deref().unwrap_or("-"),
                "read"
            );
        }
    }
}
