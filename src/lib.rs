//! A small, fast content-drop service.
//!
//! Clients `POST /post` a blob of bytes and get back a short alphanumeric
//! key; anyone may `GET /{key}` to retrieve the blob until it expires.
//! Bytedrop is content-agnostic (the declared media type is stored and
//! echoed back), compresses payloads transparently on disk, enforces size
//! and per-IP rate limits, and persists records on the local filesystem so
//! restarts keep unexpired content.
//!
//! # Architecture
//! - [`store`] owns the flat content directory: one immutable file per
//!   record, created exactly once via exclusive-create.
//! - [`cache`] fronts the store with a weight-bounded, idle-expiring
//!   in-memory cache; concurrent misses share one disk load, and fresh
//!   uploads are readable from memory before they are durable.
//! - [`routes`] is the request pipeline: upload and read state machines,
//!   compression negotiation, path validation.
//! - [`ratelimit`], [`token`], [`codec`], and [`content`] are the leaf
//!   pieces: per-IP windows, key generation, gzip, and the record format.
//! - [`sweeper`] deletes expired records in the background; [`accesslog`]
//!   serializes access logging off the request path.
//!
//! # Compatibility
//! - Runtime: `tokio`
//! - HTTP: `hyper` 1.x

/// Asynchronous access logging through a dedicated worker.
pub mod accesslog;

/// In-memory content cache with single-flight loading.
pub mod cache;

/// Gzip compression of content payloads.
pub mod codec;

/// Configuration file handling and defaults.
pub mod config;

/// Content records and their on-disk encoding.
pub mod content;

/// CORS headers and preflight responses.
pub mod cors;

/// Per-IP request rate limiting.
pub mod ratelimit;

/// Response conversion for handler return values.
pub mod responder;

/// Application state, dispatch, and the request handlers.
pub mod routes;

/// HTTP server loop.
pub mod server;

/// Filesystem persistence for content records.
pub mod store;

/// Background expiry sweeping.
pub mod sweeper;

/// Opaque key generation.
pub mod token;

/// Tracing subscriber setup.
pub mod tracing;

/// Core type aliases.
pub mod types;

pub use routes::App;
pub use server::serve;
