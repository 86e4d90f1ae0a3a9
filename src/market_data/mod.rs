pub mod candle_series;

// Re-export for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle_series::{Candle, CandleSeries};
