// =============================================================================
// Quote Cache — last good quote per symbol, persisted as JSON
// =============================================================================
//
// One file per symbol, `<TICKER>_cache.json`, overwritten wholesale after
// every successful fetch. Writes go to a `.tmp` sibling first and are renamed
// into place, so a reader never sees a half-written record.
//
// Record layout:
//   { "price": 65000.12, "price_change": 950.0, "change_24h": 1.5,
//     "last_update": "2024-01-01T00:00:00", "api": "Binance" }
// =============================================================================

use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CacheError;
use crate::exchange::{EndpointDescriptor, EndpointRegistry};
use crate::types::{Quote, Symbol};

/// Format used for `last_update`; the fraction is omitted when zero.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// On-disk shape of a cached quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheRecord {
    price: f64,
    #[serde(default)]
    price_change: f64,
    change_24h: f64,
    last_update: String,
    api: String,
}

impl CacheRecord {
    fn from_quote(quote: &Quote) -> Self {
        Self {
            price: quote.price,
            price_change: quote.price_change,
            change_24h: quote.change_24h,
            last_update: quote.last_update.format(TIMESTAMP_FORMAT).to_string(),
            api: quote.endpoint.clone(),
        }
    }
}

/// Directory-backed store of [`Quote`]s keyed by ticker.
#[derive(Debug, Clone)]
pub struct QuoteCache {
    dir: PathBuf,
}

impl QuoteCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, symbol: &Symbol) -> PathBuf {
        self.dir.join(format!("{}_cache.json", symbol.ticker))
    }

    /// Replace the record for `symbol` with `quote`.
    pub fn save(&self, symbol: &Symbol, quote: &Quote) -> Result<(), CacheError> {
        let path = self.path(symbol);
        let record = CacheRecord::from_quote(quote);

        let content = serde_json::to_string(&record).map_err(|e| CacheError::Corrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content).map_err(|source| CacheError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &path).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(symbol = %symbol, path = %path.display(), "quote cached");
        Ok(())
    }

    /// Read back the record for `symbol` and resolve its endpoint by name.
    pub fn load(
        &self,
        symbol: &Symbol,
        registry: &EndpointRegistry,
    ) -> Result<(Quote, EndpointDescriptor), CacheError> {
        let path = self.path(symbol);

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CacheError::NotFound { path });
            }
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        let record: CacheRecord =
            serde_json::from_str(&content).map_err(|e| CacheError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let last_update = parse_timestamp(&record.last_update).ok_or_else(|| {
            CacheError::Corrupt {
                path: path.clone(),
                reason: format!("unreadable last_update '{}'", record.last_update),
            }
        })?;

        let endpoint = registry
            .lookup(&record.api)
            .map_err(|_| CacheError::DescriptorNotFound {
                path: path.clone(),
                name: record.api.clone(),
            })?
            .clone();

        let quote = Quote {
            price: record.price,
            price_change: record.price_change,
            change_24h: record.change_24h,
            last_update,
            endpoint: record.api,
        };
        Ok((quote, endpoint))
    }
}

/// Accepts the offset-less form this cache writes and RFC 3339 with an offset
/// (normalised to UTC).
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_utc()))
}
