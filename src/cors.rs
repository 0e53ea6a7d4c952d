//! Cross-origin resource sharing.
//!
//! The service exposes a single permissive policy: every response carries
//! `Access-Control-Allow-Origin: *`, and OPTIONS preflights for any path get
//! the method/header allowances below with a one-day cache.

use bytes::Bytes;
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE, HeaderValue,
};
use http_body_util::Full;

use crate::types::Response;

/// Adds the allow-origin header to an existing response.
pub fn apply(res: &mut Response) {
    res.headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
}

/// Builds the response for an OPTIONS preflight: 200, empty body, the
/// allowed methods and headers, and a one-day preflight cache.
pub fn preflight() -> Response {
    let mut res = hyper::Response::new(Full::new(Bytes::new()));
    let headers = res.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    apply(&mut res);
    res
}
