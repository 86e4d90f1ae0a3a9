// =============================================================================
// Poller — per-symbol fetch / cache / fallback cycle on a fixed interval
// =============================================================================
//
// One cycle walks every tracked symbol in order:
//
//   1. Wait until the shared rate limiter has room        (RateLimited)
//   2. Fetch price + 24h change                           (Fetching)
//   3a. Success: adopt the quote, persist it, then try the candle window.
//       A candle failure is logged and the previous window is kept.
//   3b. Failure: adopt the cached quote if one can be read back, otherwise
//       keep whatever quote the symbol already had.
//   4. Publish the symbol's state to the board.
//
// No outcome of a single symbol stops the cycle, and no cycle outcome stops
// the loop.
// =============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::app_state::{SymbolSnapshot, TickerBoard};
use crate::error::CacheError;
use crate::exchange::{EndpointDescriptor, EndpointRegistry, ExchangeClient};
use crate::market_data::CandleSeries;
use crate::quote_cache::QuoteCache;
use crate::runtime_config::RuntimeConfig;
use crate::types::{PollPhase, Quote, QuoteOrigin, Symbol};

// =============================================================================
// Per-symbol state
// =============================================================================

#[derive(Debug, Clone)]
pub struct SymbolState {
    pub symbol: Symbol,
    /// Name of the active endpoint descriptor.
    pub endpoint: String,
    pub phase: PollPhase,
    pub quote: Option<Quote>,
    pub origin: Option<QuoteOrigin>,
    pub candles: Option<CandleSeries>,
    pub last_error: Option<String>,
    /// Timestamp of the newest live quote, kept apart from cached quotes.
    last_live: Option<NaiveDateTime>,
}

impl SymbolState {
    fn new(symbol: Symbol, endpoint: String) -> Self {
        Self {
            symbol,
            endpoint,
            phase: PollPhase::Idle,
            quote: None,
            origin: None,
            candles: None,
            last_error: None,
            last_live: None,
        }
    }

    fn transition(&mut self, next: PollPhase) {
        debug!(symbol = %self.symbol, from = ?self.phase, to = ?next, "poll phase");
        self.phase = next;
    }

    fn snapshot(&self, assets_dir: &std::path::Path) -> SymbolSnapshot {
        SymbolSnapshot {
            symbol: self.symbol.clone(),
            phase: self.phase,
            quote: self.quote.clone(),
            origin: self.origin,
            candles: self.candles.clone(),
            endpoint: self.endpoint.clone(),
            logo_path: self.symbol.logo_path(assets_dir),
            last_error: self.last_error.clone(),
        }
    }
}

/// Live quotes never move backwards in time: a completion time earlier than
/// the previous live timestamp is raised to it.
fn stamp_monotonic(previous: Option<NaiveDateTime>, mut quote: Quote) -> Quote {
    if let Some(prev) = previous {
        if quote.last_update < prev {
            quote.last_update = prev;
        }
    }
    quote
}

/// Outcome counts of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub live: usize,
    pub cached: usize,
    pub missing: usize,
    pub failed: usize,
}

// =============================================================================
// Poller
// =============================================================================

pub struct Poller {
    client: ExchangeClient,
    cache: QuoteCache,
    registry: EndpointRegistry,
    board: Arc<TickerBoard>,
    poll_interval: Duration,
    kline_interval: String,
    kline_limit: u32,
    assets_dir: PathBuf,
    states: Vec<SymbolState>,
}

impl Poller {
    /// Build a poller for every configured symbol, each starting on the
    /// default endpoint. The initial (empty) state is published right away so
    /// the board lists symbols in configuration order.
    pub fn new(
        config: &RuntimeConfig,
        registry: EndpointRegistry,
        client: ExchangeClient,
        board: Arc<TickerBoard>,
    ) -> Self {
        let states: Vec<SymbolState> = config
            .symbols
            .iter()
            .map(|s| SymbolState::new(s.clone(), config.default_endpoint.clone()))
            .collect();

        for state in &states {
            board.publish(state.snapshot(&config.assets_dir));
        }

        Self {
            client,
            cache: QuoteCache::new(&config.cache_dir),
            registry,
            board,
            poll_interval: config.poll_interval(),
            kline_interval: config.kline_interval.clone(),
            kline_limit: config.kline_limit,
            assets_dir: config.assets_dir.clone(),
            states,
        }
    }

    #[cfg(test)]
    pub fn states(&self) -> &[SymbolState] {
        &self.states
    }

    /// Poll forever. Cycles start `poll_interval` apart; a cycle that overruns
    /// delays the next one instead of queueing extra cycles.
    pub async fn run(&mut self, mut on_cycle: impl FnMut(CycleSummary)) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let summary = self.run_cycle().await;
            on_cycle(summary);
        }
    }

    /// Poll every symbol once, in order.
    pub async fn run_cycle(&mut self) -> CycleSummary {
        let mut states = std::mem::take(&mut self.states);
        for state in states.iter_mut() {
            self.poll_symbol(state).await;
            self.board.publish(state.snapshot(&self.assets_dir));
        }
        self.states = states;

        let mut summary = CycleSummary::default();
        for state in &self.states {
            match state.origin {
                Some(QuoteOrigin::Live) if state.phase == PollPhase::Success => summary.live += 1,
                Some(QuoteOrigin::Cached) if state.phase == PollPhase::Failed => {
                    summary.cached += 1
                }
                None => summary.missing += 1,
                _ => {}
            }
            if state.phase == PollPhase::Failed {
                summary.failed += 1;
            }
        }

        debug!(
            live = summary.live,
            cached = summary.cached,
            missing = summary.missing,
            failed = summary.failed,
            "poll cycle complete"
        );
        summary
    }

    #[instrument(skip_all, name = "poller::poll_symbol", fields(symbol = %state.symbol))]
    async fn poll_symbol(&self, state: &mut SymbolState) {
        let endpoint = match self.registry.lookup(&state.endpoint) {
            Ok(ep) => ep.clone(),
            Err(e) => {
                error!(error = %e, "active endpoint is not configured");
                state.transition(PollPhase::Failed);
                state.last_error = Some(e.to_string());
                return;
            }
        };

        state.transition(PollPhase::RateLimited);
        self.client.limiter().ready().await;

        state.transition(PollPhase::Fetching);
        match self.client.fetch_quote(&state.symbol, &endpoint).await {
            Ok(quote) => self.on_success(state, &endpoint, quote).await,
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "quote fetch failed, falling back to cache");
                self.board.push_error(&state.symbol, e.to_string());
                state.transition(PollPhase::Failed);
                state.last_error = Some(e.to_string());
                self.fall_back(state);
            }
        }
    }

    async fn on_success(
        &self,
        state: &mut SymbolState,
        endpoint: &EndpointDescriptor,
        quote: Quote,
    ) {
        let quote = stamp_monotonic(state.last_live, quote);
        state.last_live = Some(quote.last_update);

        if let Err(e) = self.cache.save(&state.symbol, &quote) {
            error!(error = %e, "failed to persist quote");
        }

        state.quote = Some(quote);
        state.origin = Some(QuoteOrigin::Live);
        state.last_error = None;
        state.transition(PollPhase::Success);

        match self
            .client
            .fetch_candles(&state.symbol, endpoint, &self.kline_interval, self.kline_limit)
            .await
        {
            Ok(series) => state.candles = Some(series),
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "candle fetch failed, keeping previous window");
            }
        }
    }

    fn fall_back(&self, state: &mut SymbolState) {
        match self.cache.load(&state.symbol, &self.registry) {
            Ok((quote, endpoint)) => {
                info!(
                    price = quote.price,
                    last_update = %quote.last_update,
                    endpoint = %endpoint.name,
                    "loaded cached quote"
                );
                state.endpoint = endpoint.name;
                state.quote = Some(quote);
                state.origin = Some(QuoteOrigin::Cached);
            }
            Err(CacheError::NotFound { path }) => {
                warn!(path = %path.display(), "no cache file, keeping current quote");
            }
            Err(e @ (CacheError::Corrupt { .. } | CacheError::Io { .. })) => {
                error!(error = %e, "cache record unreadable, keeping current quote");
            }
            Err(CacheError::DescriptorNotFound { path, name }) => {
                let known: Vec<&str> = self.registry.names().collect();
                error!(
                    path = %path.display(),
                    endpoint = %name,
                    configured = ?known,
                    "CACHED ENDPOINT NOT CONFIGURED: fallback skipped for this cycle"
                );
                self.board.push_error(
                    &state.symbol,
                    format!("cached endpoint '{name}' is not configured"),
                );
            }
        }
    }
}
