// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::reload::{Reloader, StalenessMonitor};
use crate::application::snapshot_source::SnapshotSource;
use crate::application::station_core::StationCore;
use crate::application::station_service::StationService;
use crate::infrastructure::config::load_settings;
use crate::infrastructure::http_snapshot_source::HttpSnapshotSource;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{dashboard, health_check, ingest, now_ms, stream_events};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings().context("loading settings")?;

    // Bootstrap from the station's snapshot document
    let source: Arc<dyn SnapshotSource> = Arc::new(HttpSnapshotSource::new(
        settings.snapshot.data_url.clone(),
        settings.snapshot.probe_url.clone(),
    ));
    let snapshot = source
        .fetch_snapshot()
        .await
        .with_context(|| format!("fetching bootstrap snapshot from {}", settings.snapshot.data_url))?;

    let started_ms = now_ms();
    let core = StationCore::from_snapshot(snapshot, started_ms);
    let monitor = StalenessMonitor::new(core.archive_interval_ms(), started_ms);
    let service = StationService::spawn(core);
    let reloader = Arc::new(Reloader::new(source, service.clone(), monitor));

    // Keep checking for stale data even when no messages arrive
    let poll_seconds = settings.snapshot.poll_seconds.max(1);
    let ticker = reloader.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(poll_seconds));
        loop {
            interval.tick().await;
            if let Err(e) = ticker.check(now_ms()).await {
                tracing::warn!(error = %e, "periodic snapshot check failed");
            }
        }
    });

    let state = Arc::new(AppState {
        service,
        reloader,
        compress_streams: settings.stream.compress,
    });

    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/topics/*topic", post(ingest))
        .route("/dashboard", get(dashboard))
        .route("/stream", get(stream_events))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = settings
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", settings.server.bind))?;
    tracing::info!(%addr, "starting weather-live service");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
