// =============================================================================
// Ticker Feed — Main Entry Point
// =============================================================================
//
// Polls price, 24h change and a short candle window for each configured
// symbol, falling back to the last cached quote whenever the exchange cannot
// be reached. Runs until Ctrl+C.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod app_state;
mod display;
mod error;
mod exchange;
mod market_data;
mod poller;
mod quote_cache;
mod runtime_config;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::TickerBoard;
use crate::exchange::{ExchangeClient, RateLimiter, ReqwestTransport};
use crate::poller::Poller;
use crate::runtime_config::RuntimeConfig;

const DEFAULT_CONFIG_PATH: &str = "ticker_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Ticker feed starting up");

    let config_path =
        std::env::var("TICKER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // Write the defaults out once so there is a file to edit.
    if !std::path::Path::new(&config_path).exists() {
        if let Err(e) = config.save(&config_path) {
            error!(error = %e, "Failed to write default config");
        }
    }

    // Override symbols from env if available.
    if let Ok(syms) = std::env::var("TICKER_SYMBOLS") {
        config
            .apply_symbol_override(&syms)
            .context("invalid TICKER_SYMBOLS")?;
    }

    let registry = config.validate().context("invalid ticker configuration")?;

    info!(
        symbols = ?config.symbols.iter().map(|s| s.ticker.as_str()).collect::<Vec<_>>(),
        endpoint = %config.default_endpoint,
        poll_interval_secs = config.poll_interval_secs,
        cache_dir = %config.cache_dir.display(),
        "Configured symbols"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit_calls,
        config.rate_limit_window(),
    ));
    let board = Arc::new(TickerBoard::new(limiter.clone()));

    // ── 3. Build exchange client ─────────────────────────────────────────
    let client = ExchangeClient::new(
        Arc::new(ReqwestTransport::new()),
        limiter,
        config.request_timeout(),
    );

    // ── 4. Poll loop ─────────────────────────────────────────────────────
    let mut poller = Poller::new(&config, registry, client, board.clone());
    let render_board = board.clone();
    let poll_loop = poller.run(move |_summary| {
        for entry in render_board.snapshot().symbols {
            info!("{}", display::render_line(&entry));
        }
    });

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::select! {
        _ = poll_loop => {}
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for Ctrl+C")?;
            warn!("Shutdown signal received, stopping");
        }
    }

    info!(
        state_version = board.current_state_version(),
        "Ticker feed shut down complete."
    );
    Ok(())
}
