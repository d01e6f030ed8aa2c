//! Pattern detectors over an oldest-first candle window
//!
//! Both detectors are pure: they look at the tail of the window and report
//! what is present "as of now". Building a `Detection`, logging, and notifying
//! is the caller's job.

use crate::pips::to_pips;
use crate::types::{Candle, PatternKind, Side, Timeframe};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// A session gap between the prior candle's close and the latest candle's open
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GapPattern {
    pub side: Side,
    pub size_pips: Decimal,
    /// Open of the gapping candle
    pub origin_open: Decimal,
    pub prior_close: Decimal,
    pub origin_time: DateTime<Utc>,
}

impl GapPattern {
    pub fn kind(&self) -> PatternKind {
        PatternKind::gap(self.side)
    }
}

/// A base candle followed by a confirming candle and a continuation away from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBlockPattern {
    pub side: Side,
    pub zone_low: Decimal,
    pub zone_high: Decimal,
    pub base_time: DateTime<Utc>,
}

impl OrderBlockPattern {
    pub fn kind(&self) -> PatternKind {
        PatternKind::order_block(self.side)
    }
}

/// Gap between the last two candles, if at least `min_pips` wide.
///
/// Up when the latest open is above the prior close, down otherwise.
/// Fewer than two candles is a quiet no-op.
pub fn detect_gap(pair: &str, window: &[Candle], min_pips: Decimal) -> Option<GapPattern> {
    let [prior, current] = window.last_chunk::<2>()?;

    let delta = current.open - prior.close;
    if delta.is_zero() {
        return None;
    }

    let size_pips = to_pips(pair, delta);
    if size_pips < min_pips {
        return None;
    }

    let side = if delta > Decimal::ZERO {
        Side::Buy
    } else {
        Side::Sell
    };

    Some(GapPattern {
        side,
        size_pips,
        origin_open: current.open,
        prior_close: prior.close,
        origin_time: current.time,
    })
}

/// Candle body points in the direction of `side`
fn moves_with(side: Side, candle: &Candle) -> bool {
    match side {
        Side::Buy => candle.is_bullish(),
        Side::Sell => candle.is_bearish(),
    }
}

/// Candle body points against `side`
fn moves_against(side: Side, candle: &Candle) -> bool {
    match side {
        Side::Buy => candle.is_bearish(),
        Side::Sell => candle.is_bullish(),
    }
}

/// `price` lies strictly further in the `side` direction than `reference`
fn beyond(side: Side, price: Decimal, reference: Decimal) -> bool {
    match side {
        Side::Buy => price > reference,
        Side::Sell => price < reference,
    }
}

/// Order block of the given side on the last three candles (base, confirm, continuation).
///
/// A buy block is a bearish base, a bullish confirm, and a continuation that
/// closes above the confirm's close. Sell is the mirror image.
pub fn detect_order_block(side: Side, window: &[Candle]) -> Option<OrderBlockPattern> {
    let [base, confirm, continuation] = window.last_chunk::<3>()?;

    let matched = moves_against(side, base)
        && moves_with(side, confirm)
        && beyond(side, continuation.close, confirm.close);
    if !matched {
        return None;
    }

    Some(OrderBlockPattern {
        side,
        zone_low: base.low.min(base.high),
        zone_high: base.high.max(base.low),
        base_time: base.time,
    })
}

/// Leading run of candles that had closed by `now`.
///
/// The provider includes the bar still forming as the last element. Its open
/// is final but its close is not.
pub fn completed_candles(window: &[Candle], timeframe: Timeframe, now: DateTime<Utc>) -> &[Candle] {
    let closed = window.partition_point(|c| c.time + timeframe.duration() <= now);
    &window[..closed]
}

/// Run the order-block detector for both sides.
/// The two sides are mutually exclusive on the same base candle.
pub fn detect_order_blocks(window: &[Candle]) -> Vec<OrderBlockPattern> {
    Side::BOTH
        .into_iter()
        .filter_map(|side| detect_order_block(side, window))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    pub(crate) fn candle(hour: u32, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            time: Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap(),
            open,
            high,
            low,
            close,
        }
    }

    fn bullish_ob_window() -> Vec<Candle> {
        vec![
            candle(0, dec!(1.0900), dec!(1.0910), dec!(1.0850), dec!(1.0860)),
            candle(4, dec!(1.0860), dec!(1.0920), dec!(1.0855), dec!(1.0915)),
            candle(8, dec!(1.0915), dec!(1.0960), dec!(1.0910), dec!(1.0950)),
        ]
    }

    /// Mirror every price around 2.0 so bullish becomes bearish
    fn mirrored(window: &[Candle]) -> Vec<Candle> {
        let m = dec!(2);
        window
            .iter()
            .map(|c| Candle {
                time: c.time,
                open: m - c.open,
                high: m - c.low,
                low: m - c.high,
                close: m - c.close,
            })
            .collect()
    }

    #[test]
    fn test_gap_at_threshold_fires() {
        let window = vec![
            candle(0, dec!(110.10), dec!(110.30), dec!(109.90), dec!(110.00)),
            candle(4, dec!(110.20), dec!(110.40), dec!(110.10), dec!(110.30)),
        ];
        let gap = detect_gap("USD/JPY", &window, dec!(20)).expect("20 pip gap");
        assert_eq!(gap.side, Side::Buy);
        assert_eq!(gap.kind(), PatternKind::GapUp);
        assert_eq!(gap.size_pips, dec!(20));
        assert_eq!(gap.origin_open, dec!(110.20));
        assert_eq!(gap.prior_close, dec!(110.00));
    }

    #[test]
    fn test_gap_one_pip_below_threshold_is_quiet() {
        let window = vec![
            candle(0, dec!(110.10), dec!(110.30), dec!(109.90), dec!(110.00)),
            candle(4, dec!(110.19), dec!(110.40), dec!(110.10), dec!(110.30)),
        ];
        assert!(detect_gap("USD/JPY", &window, dec!(20)).is_none());
    }

    #[test]
    fn test_gap_down_on_standard_pair() {
        let window = vec![
            candle(0, dec!(1.2550), dec!(1.2560), dec!(1.2500), dec!(1.2520)),
            candle(4, dec!(1.2500), dec!(1.2510), dec!(1.2480), dec!(1.2490)),
        ];
        let gap = detect_gap("GBP/USD", &window, dec!(20)).expect("20 pip gap");
        assert_eq!(gap.kind(), PatternKind::GapDown);
        assert_eq!(gap.size_pips, dec!(20));

        // Same prices on a JPY pair are a fraction of a pip
        assert!(detect_gap("GBP/JPY", &window, dec!(20)).is_none());
    }

    #[test]
    fn test_gap_needs_two_candles() {
        let window = vec![candle(0, dec!(1.1), dec!(1.2), dec!(1.0), dec!(1.1))];
        assert!(detect_gap("EUR/USD", &window, dec!(0)).is_none());
        assert!(detect_gap("EUR/USD", &[], dec!(0)).is_none());
    }

    #[test]
    fn test_buy_order_block() {
        let window = bullish_ob_window();
        let blocks = detect_order_blocks(&window);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind(), PatternKind::BuyOrderBlock);
        assert_eq!(blocks[0].zone_low, dec!(1.0850));
        assert_eq!(blocks[0].zone_high, dec!(1.0910));
        assert_eq!(blocks[0].base_time, window[0].time);
    }

    #[test]
    fn test_sell_order_block_is_mirror() {
        let window = mirrored(&bullish_ob_window());
        let blocks = detect_order_blocks(&window);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind(), PatternKind::SellOrderBlock);
        assert_eq!(blocks[0].zone_low, window[0].low);
        assert_eq!(blocks[0].zone_high, window[0].high);
        assert!(blocks[0].zone_low <= blocks[0].zone_high);
    }

    #[test]
    fn test_failed_continuation_is_quiet() {
        let mut window = bullish_ob_window();
        // Continuation closes below the confirm close
        window[2].close = dec!(1.0900);
        assert!(detect_order_blocks(&window).is_empty());

        // Equal close is not a continuation either
        window[2].close = window[1].close;
        assert!(detect_order_blocks(&window).is_empty());
    }

    #[test]
    fn test_order_block_uses_last_three_candles() {
        let mut window = vec![candle(0, dec!(1.2), dec!(1.3), dec!(1.1), dec!(1.25))];
        window.extend(bullish_ob_window());
        let blocks = detect_order_blocks(&window);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].zone_low, dec!(1.0850));
    }

    #[test]
    fn test_completed_candles_drops_forming_bar() {
        let window = bullish_ob_window();
        let at = |hour| Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap();

        // 08:00 bar closes at 12:00
        assert_eq!(completed_candles(&window, Timeframe::FourHour, at(11)).len(), 2);
        assert_eq!(completed_candles(&window, Timeframe::FourHour, at(12)).len(), 3);
        // Same bars read as daily candles have not closed yet
        assert!(completed_candles(&window, Timeframe::OneDay, at(12)).is_empty());
    }

    #[test]
    fn test_order_block_needs_three_candles() {
        let window = bullish_ob_window();
        assert!(detect_order_blocks(&window[1..]).is_empty());
    }

    #[test]
    fn test_detection_is_deterministic() {
        let window = bullish_ob_window();
        let first = detect_order_blocks(&window);
        for _ in 0..10 {
            assert_eq!(detect_order_blocks(&window), first);
        }
    }
}
