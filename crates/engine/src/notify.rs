//! Notification sink and message formatting

use crate::detectors::GapPattern;
use crate::scoring::ScoreCard;
use crate::types::{Detection, Outcome, PatternGeometry, Side, Timeframe};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Best-effort delivery of human-readable messages.
/// Failures are logged by the implementation and never reach the caller.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, text: &str);
}

fn tick(flag: bool) -> &'static str {
    if flag {
        "✅"
    } else {
        "❌"
    }
}

fn tf_label(timeframe: Timeframe) -> String {
    timeframe.provider_code().to_uppercase()
}

fn oscillator_reading(value: Decimal) -> &'static str {
    if value > crate::scoring::OVERBOUGHT {
        "Overbought"
    } else if value < crate::scoring::OVERSOLD {
        "Oversold"
    } else {
        "Neutral"
    }
}

/// Analysis block stored with the log row and appended to the detection message
pub fn order_block_summary(card: &ScoreCard) -> String {
    let emoji = match card.score {
        s if s >= 4 => "🟢",
        2 | 3 => "🟡",
        _ => "🔴",
    };
    let s = &card.signals;

    format!(
        "{emoji} *{tier}* ({score}/5)\n\
         \n\
         🧠 Smart Money Analysis:\n\
         - RSI: {rsi} ({reading})\n\
         - Imbalance? {imbalance}\n\
         - Breaker Candle? {breaker}\n\
         - Rejection Wick? {rejection}\n\
         - Old High/Low? {structural}\n\
         \n\
         💡 Suggested Trade: {action}",
        tier = card.tier.label(),
        score = card.score,
        rsi = card.oscillator.round_dp(1),
        reading = oscillator_reading(card.oscillator),
        imbalance = tick(s.imbalance),
        breaker = tick(s.breaker),
        rejection = tick(s.rejection_wick),
        structural = tick(s.structural_extreme),
        action = card.action,
    )
}

pub fn order_block_message(detection: &Detection) -> String {
    let title = match detection.kind.side() {
        Side::Buy => "BUY ORDER BLOCK DETECTED",
        Side::Sell => "SELL ORDER BLOCK DETECTED",
    };
    let zone = match detection.geometry {
        PatternGeometry::Zone { low, high } => format!("{low:.4} – {high:.4}"),
        PatternGeometry::Gap { .. } => String::from("-"),
    };

    format!(
        "📦 *{title}*\n\
         Pair: {pair}\n\
         Timeframe: {tf}\n\
         Zone: {zone}\n\
         Base: {base}\n\
         🔗 {url}\n\
         \n\
         {summary}",
        pair = detection.pair,
        tf = tf_label(detection.timeframe),
        base = detection.base_candle_time.format("%Y-%m-%d %H:%M"),
        url = detection.chart_url,
        summary = detection.summary,
    )
}

pub fn gap_message(detection: &Detection, gap: &GapPattern) -> String {
    let (arrow, title) = match gap.side {
        Side::Buy => ("⬆️", "GAP UP DETECTED"),
        Side::Sell => ("⬇️", "GAP DOWN DETECTED"),
    };

    format!(
        "{arrow} *{title}*\n\
         Pair: {pair}\n\
         Timeframe: {tf}\n\
         Gap: {pips} pips ({prior} → {open})\n\
         🔗 {url}",
        pair = detection.pair,
        tf = tf_label(detection.timeframe),
        pips = gap.size_pips.round_dp(1),
        prior = gap.prior_close,
        open = gap.origin_open,
        url = detection.chart_url,
    )
}

pub fn outcome_message(detection: &Detection, outcome: Outcome) -> String {
    format!(
        "📊 {kind} {outcome} — {pair} ({tf})",
        kind = detection.kind.label(),
        outcome = outcome.label(),
        pair = detection.pair,
        tf = tf_label(detection.timeframe),
    )
}
