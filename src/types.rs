// =============================================================================
// Shared types used across the ticker feed
// =============================================================================

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A tracked instrument: the ticker shown to users and the exchange's own
/// symbol for it.
///
/// Deserialising goes through [`Symbol::new`], so symbols read from a config
/// file are normalised the same way as parsed pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSymbol")]
pub struct Symbol {
    pub ticker: String,
    pub exchange_symbol: String,
}

#[derive(Deserialize)]
struct RawSymbol {
    ticker: String,
    exchange_symbol: String,
}

impl TryFrom<RawSymbol> for Symbol {
    type Error = ConfigError;

    fn try_from(raw: RawSymbol) -> Result<Self, Self::Error> {
        Self::new(&raw.ticker, &raw.exchange_symbol)
    }
}

impl Symbol {
    pub fn new(ticker: &str, exchange_symbol: &str) -> Result<Self, ConfigError> {
        let ticker = normalise(ticker, "ticker is empty")?;
        let exchange_symbol = normalise(exchange_symbol, "exchange symbol is empty")?;
        Ok(Self {
            ticker,
            exchange_symbol,
        })
    }

    /// Parse a `TICKER:EXCHANGESYMBOL` pair, e.g. `BTC:BTCUSDT`.
    pub fn parse_pair(pair: &str) -> Result<Self, ConfigError> {
        let (ticker, exchange_symbol) =
            pair.split_once(':').ok_or_else(|| ConfigError::InvalidSymbol {
                value: pair.to_string(),
                reason: "expected TICKER:EXCHANGE_SYMBOL",
            })?;
        Self::new(ticker, exchange_symbol).map_err(|_| ConfigError::InvalidSymbol {
            value: pair.to_string(),
            reason: "both sides of the pair must be non-empty",
        })
    }

    /// Logo asset for this ticker, e.g. `./assets/btc.png`.
    pub fn logo_path(&self, assets_dir: &Path) -> PathBuf {
        assets_dir.join(format!("{}.png", self.ticker.to_lowercase()))
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ticker)
    }
}

fn normalise(value: &str, reason: &'static str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidSymbol {
            value: value.to_string(),
            reason,
        });
    }
    Ok(trimmed.to_uppercase())
}

/// Price and 24h change snapshot for one symbol.
///
/// `last_update` is UTC wall-clock time without an offset, matching the
/// on-disk cache format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    /// Absolute 24h price change.
    pub price_change: f64,
    /// 24h change in percent.
    pub change_24h: f64,
    pub last_update: NaiveDateTime,
    /// Name of the endpoint descriptor the quote came from.
    pub endpoint: String,
}

/// Where the current quote of a symbol came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteOrigin {
    Live,
    Cached,
}

impl std::fmt::Display for QuoteOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "Live"),
            Self::Cached => write!(f, "Cached"),
        }
    }
}

/// Per-symbol position in one poll cycle:
/// `Idle -> RateLimited -> Fetching -> {Success, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollPhase {
    Idle,
    RateLimited,
    Fetching,
    Success,
    Failed,
}
