use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use bytedrop::config::Config;
use bytedrop::routes::App;
use bytedrop::server;
use bytedrop::tracing::init_tracing;

/// Directory holding one file per stored record.
const CONTENT_DIR: &str = "content";

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    let config = Config::load(Path::new(&config_path))?;

    // All blocking disk work (loads, saves, sweep passes) shares one pool
    // bounded by the configured worker count.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(config.core_pool_size.max(1))
        .build()
        .context("failed to build runtime")?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    init_tracing();

    let app = Arc::new(App::new(config.clone(), CONTENT_DIR)?);
    app.spawn_background();

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    server::serve(listener, app).await
}
