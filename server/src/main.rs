//! Currency Service Binary
//!
//! Serves the conversion API and the single-file mirror, with a background
//! poller keeping the exposed path and the rate table current.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use currency_rates::{ConversionEngine, PgRateSource, RateCache, RateRefresher};
use currency_server::{
    api, mirror, ConfigPoller, CurrencyService, EnvModeSource, ExposedPathRegistry, FileMirror,
    FlagdClient, IntervalTicker, PolicyMode, PollerSettings, ServiceConfig, ServiceMetrics,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting currency service");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let metrics = Arc::new(ServiceMetrics::new());

    // Rate store
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .acquire_timeout(config.database.connect_timeout)
        .connect(&config.database.url())
        .await
        .context("connecting to rate database")?;
    let source = PgRateSource::new(pool, &config.database.rates_table)?;
    let cache = Arc::new(RateCache::new());
    let refresher = Arc::new(
        RateRefresher::new(Arc::new(source), cache.clone())
            .with_timeout(config.database.query_timeout),
    );

    let loaded = refresher
        .refresh()
        .await
        .context("initial rate load")?;
    metrics.rate_refresh(true);
    info!(entries = loaded, "Initial rate table loaded");

    // Exposed path
    let mode_source = Arc::new(EnvModeSource::new());
    let registry = Arc::new(ExposedPathRegistry::new(
        config.expose.policy.clone(),
        PolicyMode::from_dynamic_enabled(config.expose.use_flagd),
    ));
    let resolver = Arc::new(FlagdClient::from_config(&config.flagd)?);

    let mut settings = PollerSettings::new(&config.flagd.flag_key, &config.expose.static_path);
    settings.resolve_timeout = config.flagd.timeout;

    let poller = ConfigPoller::new(registry.clone(), resolver, refresher, mode_source, settings)
        .with_metrics(metrics.clone());
    let poller_handle = poller.spawn(IntervalTicker::new(config.poll_interval));

    // Listeners
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mirror_router = mirror::build_router(Arc::new(FileMirror::new(registry)))
        .layer(TraceLayer::new_for_http());
    let mirror_listener = TcpListener::bind((config.listen_addr.as_str(), config.expose.http_port))
        .await
        .with_context(|| format!("binding mirror port {}", config.expose.http_port))?;

    let service = CurrencyService::new(ConversionEngine::new(cache), metrics);
    let api_router = api::build_router(service).layer(TraceLayer::new_for_http());
    let api_listener = TcpListener::bind((config.listen_addr.as_str(), config.listen_port))
        .await
        .with_context(|| format!("binding API port {}", config.listen_port))?;

    info!(
        listen_addr = %config.listen_addr,
        listen_port = config.listen_port,
        mirror_port = config.expose.http_port,
        poll_interval_secs = config.poll_interval.as_secs(),
        "Currency service running"
    );

    let mirror_server = axum::serve(mirror_listener, mirror_router)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let api_server = axum::serve(api_listener, api_router)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx));

    // Set up graceful shutdown
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let (mirror_result, api_result) = tokio::join!(mirror_server, api_server);
    poller_handle.stop().await;

    mirror_result.context("mirror server")?;
    api_result.context("API server")?;

    info!("Currency service shutdown complete");
    Ok(())
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}
