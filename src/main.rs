mod adapters;
mod api;
mod config;
mod core;
mod error;
mod refresh;

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

use crate::adapters::backend::HttpBackend;
use crate::config::AppConfig;
use crate::refresh::coordinator::{self, DashboardSnapshot, RefreshIntervals};

pub struct AppState {
    pub snapshots: watch::Receiver<Arc<DashboardSnapshot>>,
    pub ui_dir: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::load();

    // --- LOGGING SETUP ---
    let rust_log_env = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&rust_log_env))?;
    let subscriber = Registry::default().with(env_filter);

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    if log_format == "json" {
        subscriber.with(fmt::layer().json().with_current_span(false)).init();
    } else {
        subscriber.with(fmt::layer().compact()).init();
    }

    info!(
        event = "SYSTEM_STARTUP",
        service.version = env!("CARGO_PKG_VERSION"),
        service.env = %cfg.env,
        node.name = %cfg.node_name,
        backend.url = %cfg.backend_url,
        current_user = cfg.current_user.as_deref().unwrap_or("-"),
        "Pool dashboard booting"
    );

    let backend = Arc::new(HttpBackend::new(&cfg)?);
    let handle = coordinator::spawn(backend, RefreshIntervals::from_config(&cfg), cfg.current_user.clone());

    let state = Arc::new(AppState {
        snapshots: handle.subscribe(),
        ui_dir: cfg.ui_dir.clone(),
    });

    let app = api::routes::create_router(state);
    let addr = format!("{}:{}", cfg.host, cfg.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(event = "HTTP_LISTENING", addr = %addr, "API ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!(event = "SYSTEM_SHUTDOWN", "Shutdown signal received");
        })
        .await?;

    handle.shutdown().await;
    Ok(())
}
