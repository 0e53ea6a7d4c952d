//! HTTP server loop.
//!
//! Accepts connections, serves each on its own task over HTTP/1.1, and
//! stashes the peer address in the request extensions so the pipeline can
//! fall back to it when no `x-real-ip` header is present. The loop runs
//! until ctrl-c, at which point it returns cleanly and the process exits 0.

use std::convert::Infallible;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::signal;

use crate::routes::{self, App};
use crate::types::Request;

/// Runs the accept loop until shutdown or a listener error.
pub async fn serve(listener: TcpListener, app: Arc<App>) -> anyhow::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "bytedrop listening");

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let (stream, addr) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                return Ok(());
            }
        };

        let io = TokioIo::new(stream);
        let app = Arc::clone(&app);

        // Each connection gets its own task so a slow client never holds up
        // the accept loop.
        tokio::spawn(async move {
            let svc = service_fn(move |mut req: Request| {
                let app = Arc::clone(&app);
                async move {
                    req.extensions_mut().insert(addr);
                    Ok::<_, Infallible>(routes::dispatch(&app, req).await)
                }
            });

            let mut http = http1::Builder::new();
            http.keep_alive(true);
            if let Err(err) = http.serve_connection(io, svc).await {
                tracing::debug!(error = %err, "error serving connection");
            }
        });
    }
}
