// =============================================================================
// Kline Monitor — Main Entry Point
// =============================================================================
//
// Polls Binance klines for one of a configured set of symbols, derives MACD,
// RSI and Bollinger Bands, and serves the resulting session to a dashboard
// over REST + WebSocket.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod binance;
mod error;
mod indicators;
mod market_data;
mod refresh;
mod runtime_config;
mod session;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::rest::ApiState;
use crate::binance::BinanceClient;
use crate::refresh::Refresher;
use crate::runtime_config::RuntimeConfig;
use crate::session::{Session, SessionStore};

const CONFIG_PATH: &str = "kline_monitor.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Kline Monitor starting up");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env(|key| std::env::var(key).ok())?;

    config.forget_unknown_initial_symbol();
    config.validate().context("invalid configuration")?;

    info!(
        symbols = ?config.symbols,
        start = %config.start_symbol(),
        interval = %config.interval,
        limit = config.limit,
        tick_ms = config.tick_interval_ms,
        "Configuration ready"
    );

    // ── 2. Session + exchange client ─────────────────────────────────────
    let session = Session::new(config.symbols.clone(), config.start_symbol(), config.interval.clone())?;
    let store = Arc::new(SessionStore::new(session));

    let client = BinanceClient::new(config.base_url.clone(), config.request_timeout())
        .context("failed to build HTTP client")?;
    let rate_limit = client.rate_limit();

    // ── 3. Refresh loop ──────────────────────────────────────────────────
    let refresher = Arc::new(Refresher::new(Arc::clone(&store), client, &config));
    let refresh_handle = tokio::spawn(Arc::clone(&refresher).run());

    // ── 4. API server ────────────────────────────────────────────────────
    let app = api::rest::router(ApiState {
        refresher: Arc::clone(&refresher),
        rate_limit,
    });
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "API server listening");

    let api_refresher = Arc::clone(&refresher);
    tokio::spawn(async move {
        let shutdown = async move { api_refresher.stopped().await };
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
            error!(error = %e, "API server failed");
        }
    });

    // ── 5. Wait for Ctrl-C or a Shutdown command ─────────────────────────
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for Ctrl-C")?;
            warn!("Shutdown signal received, stopping gracefully");
        }
        _ = refresher.stopped() => {
            warn!("Shutdown command received, stopping gracefully");
        }
    }

    refresher.stop();
    if let Err(e) = refresh_handle.await {
        error!(error = %e, "refresh loop task failed");
    }

    info!("Kline Monitor shut down cleanly");
    Ok(())
}
