//! Outcome resolution for pending detections
//!
//! A detection is logged as `Pending` and checked again on later runs. Once it
//! is old enough for its timeframe, the latest close decides whether it
//! resolved. Terminal outcomes are never re-evaluated.

use crate::pips::from_pips;
use crate::types::{Candle, Detection, Outcome, PatternGeometry, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Whether the detection has aged past its timeframe's minimum dwell
pub fn is_due(detection: &Detection, now: DateTime<Utc>) -> bool {
    now - detection.created_at >= detection.timeframe.min_dwell()
}

/// Outcome of `detection` given the most recent candle for its pair/timeframe.
///
/// Returns the current outcome unchanged when it is already terminal, and
/// `Pending` when the detection is too young or the price has not decided yet.
pub fn resolve(detection: &Detection, now: DateTime<Utc>, latest: &Candle) -> Outcome {
    if detection.outcome.is_terminal() || !is_due(detection, now) {
        return detection.outcome;
    }

    let side = detection.kind.side();
    let price = latest.close;

    match detection.geometry {
        PatternGeometry::Zone { low, high } => resolve_zone(side, low, high, price),
        PatternGeometry::Gap {
            size_pips,
            origin_open,
        } => {
            let fill_level = gap_fill_level(&detection.pair, side, size_pips, origin_open);
            let filled = match side {
                Side::Buy => price <= fill_level,
                Side::Sell => price >= fill_level,
            };
            if filled {
                Outcome::Filled
            } else if now - detection.created_at > detection.timeframe.min_dwell() {
                Outcome::NotFilled
            } else {
                Outcome::Pending
            }
        }
    }
}

fn resolve_zone(side: Side, low: Decimal, high: Decimal, price: Decimal) -> Outcome {
    if low <= price && price <= high {
        return Outcome::Respected;
    }
    match side {
        Side::Buy if price < low => Outcome::Invalidated,
        Side::Sell if price > high => Outcome::Invalidated,
        _ => Outcome::Pending,
    }
}

/// Price the market has to return to for a gap to count as filled
pub fn gap_fill_level(pair: &str, side: Side, size_pips: Decimal, origin_open: Decimal) -> Decimal {
    let distance = from_pips(pair, size_pips);
    match side {
        Side::Buy => origin_open - distance,
        Side::Sell => origin_open + distance,
    }
}
