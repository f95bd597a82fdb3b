//! Aide Web 服务
//!
//! 启动: cargo run --bin aide-web --features web
//! 浏览器访问 http://127.0.0.1:3000

use std::path::PathBuf;
use std::sync::Arc;

use aide::config::load_config;
use aide::core::{AssistantBuilder, ShutdownManager};
use aide::{observability, web, Assistant};
use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;

    let assistant = Arc::new(Assistant::new(AssistantBuilder::new(cfg.clone()).build()));
    let app = web::build_router(assistant, &cfg.web);

    let port = std::env::var("AIDE_WEB_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(cfg.web.port);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Aide Web UI: http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let reason = shutdown.wait_for_shutdown().await;
            tracing::info!(?reason, "stopping web server");
        })
        .await
        .context("Web server failed")?;

    tracing::info!("Aide Web stopped");
    Ok(())
}
