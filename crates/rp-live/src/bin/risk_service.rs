use std::sync::Arc;

use anyhow::Context;
use rp_live::server::{self, AppState};
use rp_live::{ServiceConfig, SnapshotScheduler, SubscriberHub};
use rp_risk::HistoryStore;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServiceConfig::from_env().context("loading configuration")?;

    let history = Arc::new(HistoryStore::new(
        config.history_capacity,
        config.registry.symbols(),
    )?);
    let source = config.quote_source(rand::random());
    let hub = SubscriberHub::new();

    let scheduler = SnapshotScheduler::new(
        Arc::clone(&source),
        Arc::clone(&history),
        hub.clone(),
        config.scheduler_config(),
    );

    let state = Arc::new(AppState {
        source: source.name().to_string(),
        history,
        hub,
        stats: scheduler.stats_handle(),
    });
    let app = server::router(state, &config.cors_origin)?;

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, source = source.name(), "RiskPulse listening");

    let handle = scheduler.spawn();
    let loop_token = handle.cancellation_token();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown_signal() => {}
                // an idle or crashed loop takes the server down with it
                _ = loop_token.cancelled() => {}
            }
        })
        .await?;

    handle.shutdown().await;
    tracing::info!("RiskPulse stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received, gracefully stopping");
}
