// =============================================================================
// Ticker Board — shared state handed to the display layer
// =============================================================================
//
// The poller publishes one `SymbolSnapshot` per symbol after every poll; any
// consumer (the log renderer in `main`, a future UI) reads a consistent copy
// through `snapshot()`.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for the per-symbol entries and error log.
// =============================================================================

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::exchange::rate_limit::RateLimitSnapshot;
use crate::exchange::RateLimiter;
use crate::market_data::CandleSeries;
use crate::types::{PollPhase, Quote, QuoteOrigin, Symbol};

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

// =============================================================================
// Error Record
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Ticker the error belongs to.
    pub symbol: String,
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// Per-symbol snapshot
// =============================================================================

/// Everything the display layer needs to draw one symbol.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolSnapshot {
    pub symbol: Symbol,
    pub phase: PollPhase,
    /// `None` until the first live fetch or cache fallback.
    pub quote: Option<Quote>,
    pub origin: Option<QuoteOrigin>,
    /// Latest candle window; survives failed cycles.
    pub candles: Option<CandleSeries>,
    /// Name of the endpoint the symbol is polled on.
    pub endpoint: String,
    pub logo_path: PathBuf,
    pub last_error: Option<String>,
}

/// Serialisable copy of the whole board.
#[derive(Debug, Clone, Serialize)]
pub struct BoardSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub symbols: Vec<SymbolSnapshot>,
    pub recent_errors: Vec<ErrorRecord>,
    pub rate_limit: RateLimitSnapshot,
}

// =============================================================================
// TickerBoard
// =============================================================================

/// Latest state of every tracked symbol, shared via `Arc<TickerBoard>`.
pub struct TickerBoard {
    /// Monotonically increasing version counter, bumped on every publish.
    state_version: AtomicU64,
    symbols: RwLock<Vec<SymbolSnapshot>>,
    recent_errors: RwLock<Vec<ErrorRecord>>,
    limiter: Arc<RateLimiter>,
}

impl TickerBoard {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            symbols: RwLock::new(Vec::new()),
            recent_errors: RwLock::new(Vec::new()),
            limiter,
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Publishing ──────────────────────────────────────────────────────

    /// Insert or replace the entry for `entry.symbol`. Entries keep the order
    /// in which symbols were first published.
    pub fn publish(&self, entry: SymbolSnapshot) {
        {
            let mut symbols = self.symbols.write();
            match symbols.iter_mut().find(|s| s.symbol == entry.symbol) {
                Some(slot) => *slot = entry,
                None => symbols.push(entry),
            }
        }
        self.increment_version();
    }

    /// Record an error message. The ring buffer is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted first.
    pub fn push_error(&self, symbol: &Symbol, message: String) {
        let record = ErrorRecord {
            symbol: symbol.ticker.clone(),
            message,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            symbols: self.symbols.read().clone(),
            recent_errors: self.recent_errors.read().clone(),
            rate_limit: self.limiter.snapshot(),
        }
    }
}
