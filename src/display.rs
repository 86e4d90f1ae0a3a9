// =============================================================================
// Display formatting — text for price, change and freshness of a quote
// =============================================================================

use chrono::NaiveDateTime;

use crate::app_state::SymbolSnapshot;
use crate::types::QuoteOrigin;

/// Colour hint for a 24h move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Only a strictly positive change counts as up.
    pub fn of(change_24h: f64) -> Self {
        if change_24h > 0.0 {
            Self::Up
        } else {
            Self::Down
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            Self::Up => "▲",
            Self::Down => "▼",
        }
    }
}

/// `$` price with thousands separators. Small prices get more decimals: the
/// integer and fractional digits together aim for seven, never fewer than two
/// decimals.
pub fn format_price(price: f64) -> String {
    let int_digits = (price.trunc() as i64).to_string().len();
    let precision = 7usize.saturating_sub(int_digits).max(2);
    format!("${}", group_thousands(&format!("{price:.precision$}")))
}

/// `▲ 1.50% (+$950.00)`
pub fn format_change(change_24h: f64, price_change: f64) -> String {
    let sign = if price_change > 0.0 { "+" } else { "-" };
    format!(
        "{} {:.2}% ({sign}${:.2})",
        Direction::of(change_24h).arrow(),
        change_24h.abs(),
        price_change.abs()
    )
}

pub fn format_updated(ts: NaiveDateTime) -> String {
    format!("Last updated: {}", ts.format("%H:%M:%S"))
}

/// One log line per symbol, e.g.
///
/// ```text
/// SOL   $150.2500  ▲ 1.35% (+$2.00)  H 151.00 @5 / L 148.00 @2 (12/20 up)  Last updated: 12:00:00
/// ```
///
/// The candle segment is omitted until a series has been fetched, and cached
/// quotes end with ` (cached)`.
pub fn render_line(entry: &SymbolSnapshot) -> String {
    let Some(quote) = &entry.quote else {
        return format!("{:<5} no data yet", entry.symbol.ticker);
    };

    let mut line = format!(
        "{:<5} {}  {}",
        entry.symbol.ticker,
        format_price(quote.price),
        format_change(quote.change_24h, quote.price_change)
    );

    if let Some(series) = &entry.candles {
        let (hi, lo) = (series.highest(), series.lowest());
        let up = series.candles().iter().filter(|c| c.is_bullish()).count();
        line.push_str(&format!(
            "  H {:.2} @{} / L {:.2} @{} ({up}/{} up)",
            hi.value,
            hi.index,
            lo.value,
            lo.index,
            series.len()
        ));
    }

    line.push_str("  ");
    line.push_str(&format_updated(quote.last_update));
    if entry.origin == Some(QuoteOrigin::Cached) {
        line.push_str(" (cached)");
    }
    line
}

fn group_thousands(formatted: &str) -> String {
    let (sign, unsigned) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::{DateTime, NaiveDate, Utc};

    use super::*;
    use crate::market_data::{Candle, CandleSeries};
    use crate::types::{PollPhase, Quote, Symbol};

    #[test]
    fn price_precision_depends_on_magnitude() {
        assert_eq!(format_price(65000.12), "$65,000.12");
        assert_eq!(format_price(0.5123), "$0.512300");
        assert_eq!(format_price(150.256), "$150.2560");
        assert_eq!(format_price(1234567.891), "$1,234,567.89");
    }

    #[test]
    fn change_follows_signs() {
        assert_eq!(format_change(1.5, 950.0), "▲ 1.50% (+$950.00)");
        assert_eq!(format_change(-2.1, -12.0), "▼ 2.10% (-$12.00)");
        assert_eq!(Direction::of(0.0), Direction::Down);
    }

    #[test]
    fn updated_shows_clock_time() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 5, 7)
            .unwrap();
        assert_eq!(format_updated(ts), "Last updated: 09:05:07");
    }

    #[test]
    fn render_marks_cached_quotes() {
        let symbol = Symbol::new("BTC", "BTCUSDT").unwrap();
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bar = |high: f64, low: f64, close: f64| Candle {
            open_time: DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap(),
            open: 100.0,
            high,
            low,
            close,
        };
        let mut entry = SymbolSnapshot {
            symbol,
            phase: PollPhase::Failed,
            quote: Some(Quote {
                price: 65000.12,
                price_change: 950.0,
                change_24h: 1.5,
                last_update: ts,
                endpoint: "Binance".into(),
            }),
            origin: Some(QuoteOrigin::Cached),
            candles: CandleSeries::new(vec![bar(105.0, 99.0, 104.0), bar(103.0, 95.0, 96.0)]),
            endpoint: "Binance".into(),
            logo_path: PathBuf::from("./assets/btc.png"),
            last_error: None,
        };

        assert_eq!(
            render_line(&entry),
            concat!(
                "BTC   $65,000.12  ▲ 1.50% (+$950.00)  ",
                "H 105.00 @0 / L 95.00 @1 (1/2 up)  ",
                "Last updated: 00:00:00 (cached)"
            )
        );

        entry.candles = None;
        assert_eq!(
            render_line(&entry),
            "BTC   $65,000.12  ▲ 1.50% (+$950.00)  Last updated: 00:00:00 (cached)"
        );

        entry.quote = None;
        assert_eq!(render_line(&entry), "BTC   no data yet");
    }
}
