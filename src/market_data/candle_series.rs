use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLC bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    /// Closed at or above its open; drawn green.
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

/// Position and value of one extremum inside a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extremum {
    pub index: usize,
    pub value: f64,
}

// ---------------------------------------------------------------------------
// CandleSeries -- fixed window of bars with precomputed extrema
// ---------------------------------------------------------------------------

/// Ordered bars for one symbol (oldest first) plus the highest high and
/// lowest low of the window, used to annotate the chart.
///
/// Ties resolve to the earliest bar. A series is never empty, so it is only
/// built through [`CandleSeries::new`] and never deserialised.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleSeries {
    candles: Vec<Candle>,
    highest: Extremum,
    lowest: Extremum,
}

impl CandleSeries {
    /// Build a series, or `None` if there are no bars.
    pub fn new(candles: Vec<Candle>) -> Option<Self> {
        let (highest, lowest) = extrema(&candles)?;
        Some(Self {
            candles,
            highest,
            lowest,
        })
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn highest(&self) -> Extremum {
        self.highest
    }

    pub fn lowest(&self) -> Extremum {
        self.lowest
    }
}

/// Single linear scan; strict comparisons keep the first index on ties.
fn extrema(candles: &[Candle]) -> Option<(Extremum, Extremum)> {
    let first = candles.first()?;
    let mut highest = Extremum {
        index: 0,
        value: first.high,
    };
    let mut lowest = Extremum {
        index: 0,
        value: first.low,
    };

    for (index, c) in candles.iter().enumerate().skip(1) {
        if c.high > highest.value {
            highest = Extremum {
                index,
                value: c.high,
            };
        }
        if c.low < lowest.value {
            lowest = Extremum { index, value: c.low };
        }
    }

    Some((highest, lowest))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(i: i64, high: f64, low: f64) -> Candle {
        Candle {
            open_time: DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000 + i * 60_000)
                .unwrap(),
            open: (high + low) / 2.0,
            high,
            low,
            close: (high + low) / 2.0,
        }
    }

    #[test]
    fn empty_series_is_rejected() {
        assert!(CandleSeries::new(Vec::new()).is_none());
    }

    #[test]
    fn twenty_bars_report_high_at_5_and_low_at_2() {
        let candles: Vec<Candle> = (0..20)
            .map(|i| match i {
                5 => bar(i, 120.0, 100.0),
                2 => bar(i, 110.0, 90.0),
                _ => bar(i, 110.0, 100.0),
            })
            .collect();

        let series = CandleSeries::new(candles).unwrap();
        assert_eq!(series.len(), 20);
        assert_eq!(series.highest(), Extremum { index: 5, value: 120.0 });
        assert_eq!(series.lowest(), Extremum { index: 2, value: 90.0 });
    }

    #[test]
    fn ties_resolve_to_earliest_index() {
        let candles = vec![
            bar(0, 101.0, 99.0),
            bar(1, 105.0, 95.0),
            bar(2, 103.0, 97.0),
            bar(3, 105.0, 95.0),
        ];
        let series = CandleSeries::new(candles).unwrap();
        assert_eq!(series.highest().index, 1);
        assert_eq!(series.lowest().index, 1);
    }

    #[test]
    fn recomputing_extrema_is_deterministic() {
        let candles = vec![bar(0, 10.0, 8.0), bar(1, 10.0, 8.0), bar(2, 9.0, 8.0)];
        let a = CandleSeries::new(candles.clone()).unwrap();
        let b = CandleSeries::new(a.candles().to_vec()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.highest().index, 0);
        assert_eq!(a.lowest().index, 0);
    }

    #[test]
    fn bullish_when_close_not_below_open() {
        let mut c = bar(0, 10.0, 8.0);
        c.open = 9.0;
        c.close = 9.0;
        assert!(c.is_bullish());
        c.close = 8.5;
        assert!(!c.is_bullish());
    }

    #[test]
    fn serialised_series_carries_precomputed_extrema() {
        let series = CandleSeries::new(vec![bar(0, 10.0, 8.0), bar(1, 12.0, 7.0)]).unwrap();
        let json = serde_json::to_value(&series).unwrap();
        assert_eq!(json["highest"], serde_json::json!({"index": 1, "value": 12.0}));
        assert_eq!(json["lowest"], serde_json::json!({"index": 1, "value": 7.0}));
        assert_eq!(json["candles"].as_array().map(Vec::len), Some(2));
    }
}
