//! Core type aliases shared across the service.
//!
//! Every bytedrop payload is a fully-buffered record, so responses use
//! `Full<Bytes>` directly rather than a boxed streaming body.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;

/// An incoming HTTP request as hyper hands it to the connection service.
pub type Request = hyper::Request<Incoming>;

/// An outgoing HTTP response with a fully-buffered body.
pub type Response = hyper::Response<Full<Bytes>>;
