//! Response conversion for handler return values.
//!
//! The `Responder` trait lets handlers return plain values (a response they
//! built themselves, a string, or a `(status, message)` pair for the error
//! paths) and have dispatch turn them into a proper HTTP response.
//!
//! # Examples
//!
//! ```rust
//! use bytedrop::responder::Responder;
//! use http::StatusCode;
//!
//! let response = (StatusCode::NOT_FOUND, "Invalid path").into_response();
//! assert_eq!(response.status(), StatusCode::NOT_FOUND);
//! ```

use std::fmt::Display;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;

use crate::types::Response;

/// Converts a value into an HTTP response.
pub trait Responder {
    fn into_response(self) -> Response;
}

impl Responder for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl Responder for &'static str {
    fn into_response(self) -> Response {
        hyper::Response::new(Full::new(Bytes::from_static(self.as_bytes())))
    }
}

impl Responder for String {
    fn into_response(self) -> Response {
        hyper::Response::new(Full::new(Bytes::from(self)))
    }
}

/// A status code paired with any displayable body. This is the shape every
/// plain-text error response takes.
impl<R> Responder for (StatusCode, R)
where
    R: Display,
{
    fn into_response(self) -> Response {
        let (status, body) = self;
        let mut res = hyper::Response::new(Full::new(Bytes::from(body.to_string())));
        *res.status_mut() = status;
        res
    }
}
