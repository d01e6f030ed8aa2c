//! Confidence scoring for order-block detections
//!
//! Five independent signals, one point each. The score maps to a tier, and
//! the signals drive the suggested entry.

use crate::types::{Candle, ConfidenceTier, Side, SuggestedAction};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Candles of context the scorer looks at
pub const CONTEXT_CANDLES: usize = 5;

pub const OVERBOUGHT: Decimal = dec!(70);
pub const OVERSOLD: Decimal = dec!(30);

/// Oscillator value used when the provider has none
pub const NEUTRAL_OSCILLATOR: Decimal = dec!(50);

const IMBALANCE_RATIO: Decimal = dec!(0.3);
const BREAKER_RATIO: Decimal = dec!(1.5);
const REJECTION_RATIO: Decimal = dec!(0.4);

/// Which of the five signals fired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Signals {
    pub momentum_extreme: bool,
    pub imbalance: bool,
    pub breaker: bool,
    pub rejection_wick: bool,
    pub structural_extreme: bool,
}

impl Signals {
    pub fn score(&self) -> u8 {
        [
            self.momentum_extreme,
            self.imbalance,
            self.breaker,
            self.rejection_wick,
            self.structural_extreme,
        ]
        .into_iter()
        .filter(|fired| *fired)
        .count() as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreCard {
    pub side: Side,
    pub oscillator: Decimal,
    pub signals: Signals,
    pub score: u8,
    pub tier: ConfidenceTier,
    pub action: SuggestedAction,
}

/// Score an order block of `side` with zone `[zone_low, zone_high]` against
/// the last `CONTEXT_CANDLES` candles of an oldest-first window.
pub fn score_order_block(
    side: Side,
    zone_low: Decimal,
    zone_high: Decimal,
    oscillator: Decimal,
    window: &[Candle],
) -> ScoreCard {
    let context = &window[window.len().saturating_sub(CONTEXT_CANDLES)..];

    let mut signals = Signals {
        momentum_extreme: oscillator > OVERBOUGHT || oscillator < OVERSOLD,
        ..Signals::default()
    };

    if let Some([prev, last]) = context.last_chunk::<2>() {
        let range = last.range();

        signals.imbalance = (prev.close - last.open).abs() > range * IMBALANCE_RATIO;
        signals.breaker = prev.body() > last.body() * BREAKER_RATIO;

        let wick = match side {
            Side::Sell => last.high - last.close,
            Side::Buy => last.close - last.low,
        };
        signals.rejection_wick = wick > range * REJECTION_RATIO;

        let older = &context[..context.len() - 2];
        signals.structural_extreme = match side {
            Side::Sell => older
                .iter()
                .map(|c| c.high)
                .max()
                .is_some_and(|old_high| zone_high >= old_high),
            Side::Buy => older
                .iter()
                .map(|c| c.low)
                .min()
                .is_some_and(|old_low| zone_low <= old_low),
        };
    }

    let score = signals.score();
    ScoreCard {
        side,
        oscillator,
        signals,
        score,
        tier: ConfidenceTier::from_score(score),
        action: suggest_action(side, &signals, oscillator),
    }
}

fn suggest_action(side: Side, signals: &Signals, oscillator: Decimal) -> SuggestedAction {
    let limit_entry = match side {
        Side::Buy => signals.imbalance && oscillator < OVERSOLD,
        Side::Sell => signals.imbalance && oscillator > OVERBOUGHT,
    };

    if limit_entry {
        match side {
            Side::Buy => SuggestedAction::EnterAtZoneLow,
            Side::Sell => SuggestedAction::EnterAtZoneHigh,
        }
    } else if signals.rejection_wick {
        SuggestedAction::EnterOnBreakout
    } else {
        SuggestedAction::AwaitConfirmation
    }
}
