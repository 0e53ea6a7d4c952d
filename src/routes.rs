//! The request pipeline: application state, dispatch, and the handlers.
//!
//! Four routes exist. `POST /post` accepts a body and answers with a fresh
//! key; `GET /{key}` serves a stored record, negotiating gzip; `GET /` is
//! the static usage page; `OPTIONS` anywhere is a CORS preflight. Anything
//! else (unknown methods, unreadable bodies, malformed paths) collapses to a
//! plain 404 so the surface gives nothing away.
//!
//! Dispatch is generic over the request body so the whole pipeline can be
//! driven in tests with buffered bodies exactly as hyper drives it with
//! streaming ones.

use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use http::header::{
    ACCEPT_ENCODING, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_TYPE, EXPIRES, HeaderValue, LOCATION,
    USER_AGENT,
};
use http::{Method, StatusCode, request::Parts};
use http_body_util::{BodyExt, Full};
use tokio::task;

use crate::accesslog::{AccessEntry, AccessLog};
use crate::cache::ContentCache;
use crate::codec;
use crate::config::Config;
use crate::content::Content;
use crate::cors;
use crate::ratelimit::RateLimiter;
use crate::responder::Responder;
use crate::store::ContentStore;
use crate::sweeper;
use crate::token::TokenGenerator;
use crate::types::Response;

/// The usage page served at `/`.
const INDEX_PAGE: &str = include_str!("../assets/index.html");

/// Everything a handler needs, wired once at startup.
pub struct App {
    pub config: Config,
    pub store: Arc<ContentStore>,
    pub cache: ContentCache,
    pub tokens: TokenGenerator,
    pub post_limiter: Arc<RateLimiter>,
    pub read_limiter: Arc<RateLimiter>,
    pub access_log: AccessLog,
}

impl App {
    /// Builds the application over a content directory. Must run inside the
    /// runtime: the access-log worker is spawned here.
    pub fn new(config: Config, content_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let tokens = TokenGenerator::new(config.key_length)?;
        let store = Arc::new(ContentStore::new(content_dir)?);
        let cache = ContentCache::new(
            Arc::clone(&store),
            config.cache_max_bytes(),
            config.cache_ttl(),
        );
        let post_limiter =
            RateLimiter::new("post", config.post_rate_period(), config.post_rate_limit);
        let read_limiter =
            RateLimiter::new("read", config.read_rate_period(), config.read_rate_limit);
        let access_log = AccessLog::spawn();

        Ok(Self {
            config,
            store,
            cache,
            tokens,
            post_limiter,
            read_limiter,
            access_log,
        })
    }

    /// Spawns the long-running maintenance tasks: both rate-limiter pruners
    /// and the expiry sweeper (whose interval is the cache TTL).
    pub fn spawn_background(&self) {
        Arc::clone(&self.post_limiter).spawn_pruner();
        Arc::clone(&self.read_limiter).spawn_pruner();
        sweeper::spawn(Arc::clone(&self.store), self.config.cache_ttl());
    }
}

/// Routes one request to its handler.
pub async fn dispatch<B>(app: &App, req: hyper::Request<B>) -> Response
where
    B: hyper::body::Body<Data = Bytes>,
    B::Error: Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if method == Method::OPTIONS {
        return cors::preflight();
    }
    if method == Method::POST && path == "/post" {
        return post(app, req).await;
    }
    if method == Method::GET {
        if path == "/" {
            return index();
        }
        return read(app, req, &path).await;
    }
    error_response(StatusCode::NOT_FOUND, "Invalid path")
}

/// Serves the bundled usage page.
fn index() -> Response {
    let mut res = hyper::Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, mime::TEXT_HTML_UTF_8.as_ref())
        .body(Full::new(Bytes::from_static(INDEX_PAGE.as_bytes())))
        .unwrap();
    cors::apply(&mut res);
    res
}

/// `POST /post`: store a payload, answer 201 with its key.
async fn post<B>(app: &App, req: hyper::Request<B>) -> Response
where
    B: hyper::body::Body<Data = Bytes>,
    B::Error: Display,
{
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            tracing::debug!(error = %err, "failed to read upload body");
            return error_response(StatusCode::NOT_FOUND, "Invalid path");
        }
    };
    if body.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Missing content");
    }

    let ip = client_ip(&parts);
    if app.post_limiter.check(ip) {
        return error_response(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded");
    }

    let media_type = parts
        .headers
        .get(CONTENT_TYPE)
        .map(|value| Bytes::copy_from_slice(value.as_bytes()))
        .unwrap_or_else(|| Bytes::copy_from_slice(mime::TEXT_PLAIN.as_ref().as_bytes()));

    let key = app.tokens.generate();

    // Uploads already gzipped pass through untouched. Oversized plain bodies
    // are compressed here, because the size cap applies to the stored form.
    // Everything else defers compression to the save driver so the 201 does
    // not wait on it.
    let already_gzip = parts
        .headers
        .get(CONTENT_ENCODING)
        .is_some_and(|value| value.as_bytes() == b"gzip");
    let max_len = app.config.max_content_length();

    let mut stored = body;
    let mut compress_first = false;
    if !already_gzip {
        if stored.len() > max_len {
            let raw = stored.clone();
            stored = task::spawn_blocking(move || codec::compress(&raw))
                .await
                .expect("compression task panicked");
        } else {
            compress_first = true;
        }
    }
    if stored.len() > max_len {
        return error_response(StatusCode::PAYLOAD_TOO_LARGE, "Content too large");
    }

    let expiry = Utc::now().timestamp_millis() + app.config.lifetime().as_millis() as i64;

    app.access_log.record(AccessEntry::Post {
        key: key.clone(),
        media_type: String::from_utf8_lossy(&media_type).into_owned(),
        ip,
        user_agent: user_agent(&parts),
        size: stored.len(),
        deferred_compression: compress_first,
    });

    // Install the promise and let the save driver finish the job; readers of
    // this key are served from memory from here on.
    let form = {
        let key = key.clone();
        async move {
            let stored = if compress_first {
                task::spawn_blocking(move || codec::compress(&stored))
                    .await
                    .expect("compression task panicked")
            } else {
                stored
            };
            Arc::new(Content::new(key, media_type, expiry, stored))
        }
    };
    app.cache.put(key.clone(), form);

    let body = serde_json::json!({ "key": key }).to_string();
    let mut res = hyper::Response::builder()
        .status(StatusCode::CREATED)
        .header(LOCATION, key.as_str())
        .header("Expiry", rfc1123_ms(expiry))
        .header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .body(Full::new(Bytes::from(body)))
        .unwrap();
    cors::apply(&mut res);
    res
}

/// `GET /{key}`: serve a stored record, gzip-negotiated.
async fn read<B>(app: &App, req: hyper::Request<B>, path: &str) -> Response {
    let (parts, _body) = req.into_parts();

    let key = path.trim_start_matches('/');
    if key.is_empty() || key.contains('.') || !key.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return error_response(StatusCode::NOT_FOUND, "Invalid path");
    }

    let ip = client_ip(&parts);
    if app.read_limiter.check(ip) {
        return error_response(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded");
    }

    let gzip_accepted = accepts_gzip(&parts);

    let content = match app.cache.get(key).await {
        Ok(content) => content,
        Err(err) => {
            tracing::error!(key, error = %err, "content load failed");
            return error_response(StatusCode::NOT_FOUND, "Invalid path");
        }
    };
    if !content.is_present() {
        return error_response(StatusCode::NOT_FOUND, "Invalid path");
    }

    app.access_log.record(AccessEntry::Read {
        key: key.to_string(),
        ip,
        user_agent: user_agent(&parts),
    });

    if gzip_accepted {
        return content_response(&content, Some(content.body.clone()));
    }

    // Client cannot take gzip: unpack the stored form for it.
    let stored = content.body.clone();
    match task::spawn_blocking(move || codec::decompress(&stored))
        .await
        .expect("decompression task panicked")
    {
        Ok(plain) => {
            let mut res = content_response(&content, None);
            *res.body_mut() = Full::new(plain);
            res
        }
        Err(err) => {
            tracing::debug!(key, error = %err, "stored content failed to decompress");
            error_response(StatusCode::NOT_FOUND, "Unable to uncompress data")
        }
    }
}

/// Builds the 200 scaffold for a served record. `gzip_body` present means
/// the stored form goes out as-is under `Content-Encoding: gzip`; the caller
/// substitutes a decompressed body otherwise.
fn content_response(content: &Content, gzip_body: Option<Bytes>) -> Response {
    let media = HeaderValue::from_bytes(&content.media_type)
        .unwrap_or_else(|_| HeaderValue::from_static("text/plain"));

    let mut builder = hyper::Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, media)
        .header(CACHE_CONTROL, "public, max-age=86400")
        .header(EXPIRES, rfc1123(Utc::now() + chrono::Duration::days(1)));
    if gzip_body.is_some() {
        builder = builder.header(CONTENT_ENCODING, "gzip");
    }

    let mut res = builder
        .body(Full::new(gzip_body.unwrap_or_default()))
        .unwrap();
    cors::apply(&mut res);
    res
}

fn error_response(status: StatusCode, message: &'static str) -> Response {
    let mut res = (status, message).into_response();
    cors::apply(&mut res);
    res
}

/// Resolves the client address: `x-real-ip` wins when present and parseable
/// (the service is expected to sit behind a reverse proxy), otherwise the
/// socket address the server loop stashed in the request extensions.
fn client_ip(parts: &Parts) -> IpAddr {
    let from_header = parts
        .headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .and_then(|text| text.trim().parse().ok());
    if let Some(ip) = from_header {
        return ip;
    }
    parts
        .extensions
        .get::<SocketAddr>()
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::from([0, 0, 0, 0]))
}

/// `Accept-Encoding` handling: tokens are split on `", "` and must equal
/// `gzip` exactly; qualified tokens do not count.
fn accepts_gzip(parts: &Parts) -> bool {
    parts
        .headers
        .get(ACCEPT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(", ").any(|token| token == "gzip"))
        .unwrap_or(false)
}

fn user_agent(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

fn rfc1123(instant: DateTime<Utc>) -> String {
    instant.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn rfc1123_ms(ms: i64) -> String {
    rfc1123(Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now))
}
