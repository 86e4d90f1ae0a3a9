// =============================================================================
// Runtime Configuration — ticker settings with atomic save
// =============================================================================
//
// Every tunable of the poller lives here: the endpoint descriptors, the
// tracked symbols, poll cadence, timeouts, rate-limit budget and on-disk
// locations.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::exchange::{EndpointDescriptor, EndpointRegistry};
use crate::types::Symbol;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_endpoints() -> Vec<EndpointDescriptor> {
    vec![EndpointDescriptor::binance()]
}

fn default_endpoint_name() -> String {
    "Binance".to_string()
}

fn default_symbols() -> Vec<Symbol> {
    [
        ("BTC", "BTCUSDT"),
        ("ETH", "ETHUSDT"),
        ("SOL", "SOLUSDT"),
        ("XRP", "XRPUSDT"),
    ]
    .into_iter()
    .map(|(ticker, exchange_symbol)| Symbol {
        ticker: ticker.to_string(),
        exchange_symbol: exchange_symbol.to_string(),
    })
    .collect()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_rate_limit_calls() -> usize {
    1200
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_kline_interval() -> String {
    "1m".to_string()
}

fn default_kline_limit() -> u32 {
    20
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("./assets")
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the ticker feed.
///
/// Every field has a serde default so that an empty `{}` file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Upstream -----------------------------------------------------------

    /// Exchanges that can be polled; selected by name.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<EndpointDescriptor>,

    /// Endpoint every symbol starts on.
    #[serde(default = "default_endpoint_name")]
    pub default_endpoint: String,

    /// Instruments to track.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<Symbol>,

    // --- Cadence & limits ---------------------------------------------------

    /// Seconds between poll cycles.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Per-request timeout; a timeout counts as a failed fetch.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Outbound requests allowed per rolling window.
    #[serde(default = "default_rate_limit_calls")]
    pub rate_limit_calls: usize,

    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    // --- Candles ------------------------------------------------------------

    /// Kline bucket, in the exchange's notation.
    #[serde(default = "default_kline_interval")]
    pub kline_interval: String,

    /// Bars per series.
    #[serde(default = "default_kline_limit")]
    pub kline_limit: u32,

    // --- Paths --------------------------------------------------------------

    /// Directory holding `<TICKER>_cache.json` files.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Directory holding `<ticker>.png` logos.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            default_endpoint: default_endpoint_name(),
            symbols: default_symbols(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            rate_limit_calls: default_rate_limit_calls(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            kline_interval: default_kline_interval(),
            kline_limit: default_kline_limit(),
            cache_dir: default_cache_dir(),
            assets_dir: default_assets_dir(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ticker config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse ticker config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = config.symbols.len(),
            endpoints = config.endpoints.len(),
            "ticker config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise ticker config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "ticker config saved (atomic)");
        Ok(())
    }

    /// Replace the symbol list from a `BTC:BTCUSDT,ETH:ETHUSDT` string.
    /// Blank entries are skipped.
    pub fn apply_symbol_override(&mut self, value: &str) -> Result<(), ConfigError> {
        let symbols = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Symbol::parse_pair)
            .collect::<Result<Vec<_>, _>>()?;
        self.symbols = symbols;
        Ok(())
    }

    /// Check invariants and build the endpoint registry.
    pub fn validate(&self) -> Result<EndpointRegistry, ConfigError> {
        for (field, value) in [
            ("poll_interval_secs", self.poll_interval_secs),
            ("request_timeout_secs", self.request_timeout_secs),
            ("rate_limit_window_secs", self.rate_limit_window_secs),
            ("rate_limit_calls", self.rate_limit_calls as u64),
            ("kline_limit", u64::from(self.kline_limit)),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }

        for (i, sym) in self.symbols.iter().enumerate() {
            if Symbol::new(&sym.ticker, &sym.exchange_symbol)? != *sym {
                return Err(ConfigError::InvalidSymbol {
                    value: format!("{}:{}", sym.ticker, sym.exchange_symbol),
                    reason: "ticker and exchange symbol must be trimmed upper-case",
                });
            }
            // Cache files are keyed by ticker, so a ticker may appear only once.
            if self.symbols[..i].iter().any(|other| other.ticker == sym.ticker) {
                return Err(ConfigError::DuplicateSymbol {
                    ticker: sym.ticker.clone(),
                });
            }
        }

        let registry = EndpointRegistry::new(self.endpoints.clone())?;
        registry.lookup(&self.default_endpoint)?;
        Ok(registry)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.symbols.len(), 4);
        assert_eq!(cfg.symbols[0].ticker, "BTC");
        assert_eq!(cfg.symbols[3].exchange_symbol, "XRPUSDT");
        assert_eq!(cfg.poll_interval(), Duration::from_secs(10));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.rate_limit_calls, 1200);
        assert_eq!(cfg.rate_limit_window(), Duration::from_secs(60));
        assert_eq!(cfg.kline_interval, "1m");
        assert_eq!(cfg.kline_limit, 20);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.default_endpoint, "Binance");
        assert_eq!(cfg.endpoints.len(), 1);
        assert_eq!(cfg.symbols.len(), 4);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "poll_interval_secs": 30,
                        "symbols": [{"ticker": "ETH", "exchange_symbol": "ETHUSDT"}] }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.poll_interval_secs, 30);
        assert_eq!(cfg.symbols.len(), 1);
        assert_eq!(cfg.kline_limit, 20);
    }

    #[test]
    fn unknown_default_endpoint_fails_validation() {
        let cfg = RuntimeConfig {
            default_endpoint: "Kraken".into(),
            ..RuntimeConfig::default()
        };
        assert_eq!(
            cfg.validate().unwrap_err(),
            ConfigError::DescriptorNotFound {
                name: "Kraken".into()
            }
        );
    }

    #[test]
    fn zero_interval_fails_validation() {
        let cfg = RuntimeConfig {
            poll_interval_secs: 0,
            ..RuntimeConfig::default()
        };
        assert_eq!(
            cfg.validate().unwrap_err(),
            ConfigError::Zero {
                field: "poll_interval_secs"
            }
        );
    }

    #[test]
    fn symbols_from_file_are_normalised() {
        let json = r#"{ "symbols": [{"ticker": "btc", "exchange_symbol": " btcusdt"}] }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbols[0].ticker, "BTC");
        assert_eq!(cfg.symbols[0].exchange_symbol, "BTCUSDT");
        assert!(cfg.validate().is_ok());

        let registry = cfg.validate().unwrap();
        assert_eq!(
            registry.lookup("Binance").unwrap().price_url(&cfg.symbols[0].exchange_symbol),
            "https://api.binance.com/api/v3/ticker/price?symbol=BTCUSDT"
        );
    }

    #[test]
    fn blank_symbol_in_file_fails_to_parse() {
        let json = r#"{ "symbols": [{"ticker": "BTC", "exchange_symbol": ""}] }"#;
        assert!(serde_json::from_str::<RuntimeConfig>(json).is_err());
    }

    #[test]
    fn duplicate_tickers_fail_validation() {
        let json = r#"{ "symbols": [
            {"ticker": "btc", "exchange_symbol": "btcusdt"},
            {"ticker": "BTC", "exchange_symbol": "BTCUSDT"},
            {"ticker": "BTC", "exchange_symbol": "BTCUSDT"}
        ] }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            cfg.validate().unwrap_err(),
            ConfigError::DuplicateSymbol {
                ticker: "BTC".into()
            }
        );
    }

    #[test]
    fn unnormalised_symbol_fails_validation() {
        let cfg = RuntimeConfig {
            symbols: vec![Symbol {
                ticker: "eth".into(),
                exchange_symbol: "ETHUSDT".into(),
            }],
            ..RuntimeConfig::default()
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::InvalidSymbol { .. }
        ));
    }

    #[test]
    fn symbol_override_replaces_list() {
        let mut cfg = RuntimeConfig::default();
        cfg.apply_symbol_override("doge:dogeusdt, ,BTC:BTCUSDT").unwrap();
        assert_eq!(cfg.symbols.len(), 2);
        assert_eq!(cfg.symbols[0].ticker, "DOGE");
        assert_eq!(cfg.symbols[0].exchange_symbol, "DOGEUSDT");

        assert!(cfg.apply_symbol_override("BROKEN").is_err());
        assert_eq!(cfg.symbols.len(), 2);
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ticker_config.json");

        let cfg = RuntimeConfig {
            poll_interval_secs: 15,
            ..RuntimeConfig::default()
        };
        cfg.save(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded.poll_interval_secs, 15);
        assert_eq!(loaded.symbols, cfg.symbols);
        assert_eq!(loaded.endpoints, cfg.endpoints);
    }
}
