// =============================================================================
// Exchange REST client — price, 24h change and klines for one symbol
// =============================================================================
//
// Every request goes through the shared rate limiter first, then the
// transport with a fixed per-request timeout. Responses are decoded from
// loosely typed JSON because exchanges send decimals as strings.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::FetchError;
use crate::market_data::{Candle, CandleSeries};
use crate::types::{Quote, Symbol};

use super::endpoint::EndpointDescriptor;
use super::http::HttpTransport;
use super::rate_limit::RateLimiter;

/// Upstream error bodies are cut to this many characters in error values.
const MAX_ERROR_BODY: usize = 200;

/// Stateless fetcher shared by every polled symbol.
#[derive(Clone)]
pub struct ExchangeClient {
    transport: Arc<dyn HttpTransport>,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
}

impl ExchangeClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        limiter: Arc<RateLimiter>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            limiter,
            timeout,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Fetch the last price and 24h change for `symbol`.
    ///
    /// The quote is stamped with the time the second response was decoded.
    #[instrument(
        skip_all,
        name = "exchange::fetch_quote",
        fields(symbol = %symbol.exchange_symbol, endpoint = %endpoint.name)
    )]
    pub async fn fetch_quote(
        &self,
        symbol: &Symbol,
        endpoint: &EndpointDescriptor,
    ) -> Result<Quote, FetchError> {
        let price_body = self
            .get_json(&endpoint.price_url(&symbol.exchange_symbol))
            .await?;
        let price = parse_price(&price_body)?;

        let change_body = self
            .get_json(&endpoint.change_url(&symbol.exchange_symbol))
            .await?;
        let (price_change, change_24h) = parse_change(&change_body)?;

        debug!(price, price_change, change_24h, "quote fetched");

        Ok(Quote {
            price,
            price_change,
            change_24h,
            last_update: Utc::now().naive_utc(),
            endpoint: endpoint.name.clone(),
        })
    }

    /// Fetch the latest `limit` klines of `interval` and derive their extrema.
    #[instrument(
        skip_all,
        name = "exchange::fetch_candles",
        fields(symbol = %symbol.exchange_symbol, interval = %interval, limit = limit)
    )]
    pub async fn fetch_candles(
        &self,
        symbol: &Symbol,
        endpoint: &EndpointDescriptor,
        interval: &str,
        limit: u32,
    ) -> Result<CandleSeries, FetchError> {
        let body = self
            .get_json(&endpoint.kline_url(&symbol.exchange_symbol, interval, limit))
            .await?;
        let candles = parse_klines(&body)?;
        let series = CandleSeries::new(candles)
            .ok_or_else(|| FetchError::parse("klines", "response contained no bars"))?;

        debug!(count = series.len(), "klines fetched");
        Ok(series)
    }

    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        self.limiter.acquire().await;

        let resp = self
            .transport
            .get(url, self.timeout)
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !resp.is_success() {
            return Err(FetchError::Upstream {
                url: url.to_string(),
                status: resp.status,
                body: resp.body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        serde_json::from_str(&resp.body)
            .map_err(|e| FetchError::parse("response body", e.to_string()))
    }
}

impl std::fmt::Debug for ExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeClient")
            .field("limiter", &self.limiter)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// `{"price": "65000.12"}`
pub fn parse_price(body: &Value) -> Result<f64, FetchError> {
    let price = field_f64(body, "price")?;
    if price < 0.0 {
        return Err(FetchError::parse("price", format!("negative price {price}")));
    }
    Ok(price)
}

/// `{"priceChange": "950.0", "priceChangePercent": "1.5"}` → `(absolute, percent)`.
pub fn parse_change(body: &Value) -> Result<(f64, f64), FetchError> {
    let price_change = field_f64(body, "priceChange")?;
    let change_pct = field_f64(body, "priceChangePercent")?;
    Ok((price_change, change_pct))
}

/// Array of `[openTimeMs, open, high, low, close, ...]`; extra fields are
/// ignored. One malformed bar rejects the whole response.
///
/// Array indices:
///   [0] openTime, [1] open, [2] high, [3] low, [4] close
pub fn parse_klines(body: &Value) -> Result<Vec<Candle>, FetchError> {
    let raw = body
        .as_array()
        .ok_or_else(|| FetchError::parse("klines", "response is not an array"))?;

    let mut candles = Vec::with_capacity(raw.len());
    for (i, entry) in raw.iter().enumerate() {
        let arr = entry
            .as_array()
            .ok_or_else(|| FetchError::parse("kline", format!("entry {i} is not an array")))?;

        if arr.len() < 5 {
            return Err(FetchError::parse(
                "kline",
                format!("entry {i} has {} fields, need 5", arr.len()),
            ));
        }

        let open_ms = value_f64(&arr[0], "openTime")? as i64;
        let open_time = DateTime::<Utc>::from_timestamp_millis(open_ms).ok_or_else(|| {
            FetchError::parse("kline", format!("open time {open_ms} out of range"))
        })?;

        candles.push(Candle {
            open_time,
            open: value_f64(&arr[1], "open")?,
            high: value_f64(&arr[2], "high")?,
            low: value_f64(&arr[3], "low")?,
            close: value_f64(&arr[4], "close")?,
        });
    }

    Ok(candles)
}

fn field_f64(body: &Value, field: &'static str) -> Result<f64, FetchError> {
    let val = body
        .get(field)
        .ok_or_else(|| FetchError::parse(field, "field missing"))?;
    value_f64(val, field)
}

/// Parse a JSON value that may be either a string or a number into a finite `f64`.
fn value_f64(val: &Value, field: &'static str) -> Result<f64, FetchError> {
    let parsed = if let Some(s) = val.as_str() {
        s.trim()
            .parse::<f64>()
            .map_err(|_| FetchError::parse(field, format!("'{s}' is not a number")))?
    } else if let Some(n) = val.as_f64() {
        n
    } else {
        return Err(FetchError::parse(
            field,
            format!("expected string or number, got {val}"),
        ));
    };

    if !parsed.is_finite() {
        return Err(FetchError::parse(field, "value is not finite"));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::http::scripted::ScriptedTransport;
    use super::*;
    use crate::error::FetchErrorKind;

    fn client(transport: Arc<ScriptedTransport>) -> ExchangeClient {
        ExchangeClient::new(
            transport,
            Arc::new(RateLimiter::new(100, Duration::from_secs(60))),
            Duration::from_secs(10),
        )
    }

    fn btc() -> Symbol {
        Symbol::new("BTC", "BTCUSDT").unwrap()
    }

    #[test]
    fn parses_price_from_string_or_number() {
        assert_eq!(parse_price(&json!({"price": "65000.12"})).unwrap(), 65000.12);
        assert_eq!(parse_price(&json!({"price": 3.5})).unwrap(), 3.5);
    }

    #[test]
    fn missing_or_malformed_fields_are_parse_errors() {
        let err = parse_price(&json!({"symbol": "BTCUSDT"})).unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Parse);

        let err = parse_price(&json!({"price": "abc"})).unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Parse);

        let err = parse_change(&json!({"priceChange": "1.0"})).unwrap_err();
        assert!(err.to_string().contains("priceChangePercent"));
    }

    #[test]
    fn parses_change_pair() {
        let body = json!({"priceChange": "-950.00", "priceChangePercent": "-1.46"});
        assert_eq!(parse_change(&body).unwrap(), (-950.0, -1.46));
    }

    #[test]
    fn parses_klines_and_ignores_trailing_fields() {
        let body = json!([
            [1700000000000i64, "100.0", "105.0", "99.0", "104.0", "12.3", 1700000059999i64],
            [1700000060000i64, "104.0", "106.0", "103.0", "103.5"]
        ]);
        let candles = parse_klines(&body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open_time.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(candles[0].high, 105.0);
        assert_eq!(candles[1].close, 103.5);
    }

    #[test]
    fn short_kline_rejects_response() {
        let body = json!([[1700000000000i64, "100.0", "105.0", "99.0"]]);
        assert_eq!(parse_klines(&body).unwrap_err().kind(), FetchErrorKind::Parse);
        assert!(parse_klines(&json!({"code": -1121})).is_err());
    }

    #[tokio::test]
    async fn fetch_quote_combines_both_responses() {
        let transport = Arc::new(ScriptedTransport::new());
        let ep = EndpointDescriptor::binance();
        transport.respond(
            ep.price_url("BTCUSDT"),
            200,
            r#"{"symbol":"BTCUSDT","price":"65000.12"}"#,
        );
        transport.respond(
            ep.change_url("BTCUSDT"),
            200,
            r#"{"priceChange":"950.00","priceChangePercent":"1.50"}"#,
        );

        let before = Utc::now().naive_utc();
        let quote = client(transport.clone()).fetch_quote(&btc(), &ep).await.unwrap();
        assert_eq!(quote.price, 65000.12);
        assert_eq!(quote.price_change, 950.0);
        assert_eq!(quote.change_24h, 1.5);
        assert_eq!(quote.endpoint, "Binance");
        assert!(quote.last_update >= before);
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_error() {
        let transport = Arc::new(ScriptedTransport::new());
        let ep = EndpointDescriptor::binance();
        transport.respond(ep.price_url("BTCUSDT"), 429, r#"{"code":-1003}"#);

        let err = client(transport.clone()).fetch_quote(&btc(), &ep).await.unwrap_err();
        assert!(matches!(err, FetchError::Upstream { status: 429, .. }));
        // The change request is never issued once the price request failed.
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_is_network_error() {
        let transport = Arc::new(ScriptedTransport::new());
        let err = client(transport)
            .fetch_quote(&btc(), &EndpointDescriptor::binance())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Network);
    }

    #[tokio::test]
    async fn empty_kline_array_is_parse_error() {
        let transport = Arc::new(ScriptedTransport::new());
        let ep = EndpointDescriptor::binance();
        transport.respond(ep.kline_url("BTCUSDT", "1m", 20), 200, "[]");

        let err = client(transport)
            .fetch_candles(&btc(), &ep, "1m", 20)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Parse);
    }

    #[tokio::test]
    async fn every_request_takes_a_permit() {
        let transport = Arc::new(ScriptedTransport::new());
        let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(60)));
        let client = ExchangeClient::new(transport, limiter.clone(), Duration::from_secs(10));

        let _ = client.fetch_quote(&btc(), &EndpointDescriptor::binance()).await;
        let _ = client
            .fetch_candles(&btc(), &EndpointDescriptor::binance(), "1m", 20)
            .await;
        // Price request fails so the change request is skipped: 1 + 1.
        assert_eq!(limiter.in_window(), 2);
    }
}
