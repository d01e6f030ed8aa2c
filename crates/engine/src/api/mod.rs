//! External HTTP collaborators: market data and notifications

pub mod telegram;
pub mod twelvedata;

use crate::types::{Candle, Timeframe};
use async_trait::async_trait;
use rust_decimal::Decimal;

pub use telegram::TelegramNotifier;
pub use twelvedata::TwelveDataClient;

/// Source of recent candles and the momentum oscillator.
///
/// Implementations swallow provider errors: a failed fetch yields an empty
/// window or `None`, never an error.
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    /// Up to `count` most recent candles, oldest-first
    async fn fetch_candles(&self, pair: &str, timeframe: Timeframe, count: usize) -> Vec<Candle>;

    /// Latest oscillator reading on a 0–100 scale
    async fn fetch_momentum(&self, pair: &str, timeframe: Timeframe) -> Option<Decimal>;
}
