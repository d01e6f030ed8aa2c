//! Types for pattern detection and outcome tracking

use crate::error::ParseEnumError;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// A single OHLC candle. Windows are always ordered oldest-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// |close - open|
    pub fn body(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    /// high - low
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }
}

/// Candle timeframe tracked by the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "4h")]
    FourHour,
    #[serde(rename = "1day")]
    OneDay,
}

impl Timeframe {
    pub const ALL: [Timeframe; 2] = [Timeframe::FourHour, Timeframe::OneDay];

    /// Interval code understood by the market-data provider
    pub fn provider_code(self) -> &'static str {
        match self {
            Timeframe::FourHour => "4h",
            Timeframe::OneDay => "1day",
        }
    }

    /// Interval code used in TradingView chart links
    pub fn chart_interval(self) -> &'static str {
        match self {
            Timeframe::FourHour => "240",
            Timeframe::OneDay => "D",
        }
    }

    /// Minimum age before a pending detection on this timeframe may be resolved
    pub fn min_dwell(self) -> Duration {
        match self {
            Timeframe::FourHour => Duration::hours(6),
            Timeframe::OneDay => Duration::hours(48),
        }
    }

    /// Length of one candle
    pub fn duration(self) -> Duration {
        match self {
            Timeframe::FourHour => Duration::hours(4),
            Timeframe::OneDay => Duration::days(1),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.provider_code())
    }
}

impl FromStr for Timeframe {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "4h" => Ok(Timeframe::FourHour),
            "1day" | "1d" => Ok(Timeframe::OneDay),
            other => Err(ParseEnumError::new("timeframe", other)),
        }
    }
}

/// Direction shared by both pattern families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Buy, Side::Sell];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    GapUp,
    GapDown,
    BuyOrderBlock,
    SellOrderBlock,
}

impl PatternKind {
    pub fn gap(side: Side) -> Self {
        match side {
            Side::Buy => PatternKind::GapUp,
            Side::Sell => PatternKind::GapDown,
        }
    }

    pub fn order_block(side: Side) -> Self {
        match side {
            Side::Buy => PatternKind::BuyOrderBlock,
            Side::Sell => PatternKind::SellOrderBlock,
        }
    }

    pub fn side(self) -> Side {
        match self {
            PatternKind::GapUp | PatternKind::BuyOrderBlock => Side::Buy,
            PatternKind::GapDown | PatternKind::SellOrderBlock => Side::Sell,
        }
    }

    pub fn is_gap(self) -> bool {
        matches!(self, PatternKind::GapUp | PatternKind::GapDown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PatternKind::GapUp => "gap_up",
            PatternKind::GapDown => "gap_down",
            PatternKind::BuyOrderBlock => "buy_order_block",
            PatternKind::SellOrderBlock => "sell_order_block",
        }
    }

    /// Short human label used in notifications
    pub fn label(self) -> &'static str {
        match self {
            PatternKind::GapUp => "Gap Up",
            PatternKind::GapDown => "Gap Down",
            PatternKind::BuyOrderBlock => "Buy OB",
            PatternKind::SellOrderBlock => "Sell OB",
        }
    }
}

impl FromStr for PatternKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gap_up" => Ok(PatternKind::GapUp),
            "gap_down" => Ok(PatternKind::GapDown),
            "buy_order_block" => Ok(PatternKind::BuyOrderBlock),
            "sell_order_block" => Ok(PatternKind::SellOrderBlock),
            other => Err(ParseEnumError::new("pattern kind", other)),
        }
    }
}

/// Price geometry of a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternGeometry {
    /// Order-block zone, the base candle's [low, high]
    Zone { low: Decimal, high: Decimal },
    /// Session gap; `origin_open` is the open of the gapping candle
    Gap {
        size_pips: Decimal,
        origin_open: Decimal,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Tier1,
    Tier2,
    Tier3,
}

impl ConfidenceTier {
    /// 4+ → Tier1, 2..=3 → Tier2, otherwise Tier3
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s >= 4 => ConfidenceTier::Tier1,
            2 | 3 => ConfidenceTier::Tier2,
            _ => ConfidenceTier::Tier3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceTier::Tier1 => "tier1",
            ConfidenceTier::Tier2 => "tier2",
            ConfidenceTier::Tier3 => "tier3",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConfidenceTier::Tier1 => "👑 TIER 1 (HIGH CONFIDENCE)",
            ConfidenceTier::Tier2 => "⭐ TIER 2 (MEDIUM)",
            ConfidenceTier::Tier3 => "⚠️ TIER 3 (LOW)",
        }
    }
}

impl FromStr for ConfidenceTier {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tier1" => Ok(ConfidenceTier::Tier1),
            "tier2" => Ok(ConfidenceTier::Tier2),
            "tier3" => Ok(ConfidenceTier::Tier3),
            other => Err(ParseEnumError::new("confidence tier", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    EnterAtZoneLow,
    EnterAtZoneHigh,
    EnterOnBreakout,
    AwaitConfirmation,
    WatchForFill,
}

impl SuggestedAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestedAction::EnterAtZoneLow => "enter at zone low",
            SuggestedAction::EnterAtZoneHigh => "enter at zone high",
            SuggestedAction::EnterOnBreakout => "enter on breakout confirmation",
            SuggestedAction::AwaitConfirmation => "await lower-timeframe confirmation",
            SuggestedAction::WatchForFill => "watch for gap fill",
        }
    }
}

impl fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuggestedAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            SuggestedAction::EnterAtZoneLow,
            SuggestedAction::EnterAtZoneHigh,
            SuggestedAction::EnterOnBreakout,
            SuggestedAction::AwaitConfirmation,
            SuggestedAction::WatchForFill,
        ]
        .into_iter()
        .find(|a| a.as_str() == s)
        .ok_or_else(|| ParseEnumError::new("suggested action", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Respected,
    Invalidated,
    Filled,
    NotFilled,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        self != Outcome::Pending
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Pending => "pending",
            Outcome::Respected => "respected",
            Outcome::Invalidated => "invalidated",
            Outcome::Filled => "filled",
            Outcome::NotFilled => "not_filled",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Pending => "Pending",
            Outcome::Respected => "Respected ✅",
            Outcome::Invalidated => "Invalidated ❌",
            Outcome::Filled => "Filled ✅",
            Outcome::NotFilled => "Not Filled ❌",
        }
    }
}

impl FromStr for Outcome {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Outcome::Pending),
            "respected" => Ok(Outcome::Respected),
            "invalidated" => Ok(Outcome::Invalidated),
            "filled" => Ok(Outcome::Filled),
            "not_filled" => Ok(Outcome::NotFilled),
            other => Err(ParseEnumError::new("outcome", other)),
        }
    }
}

/// Score and tier attached to an order-block detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confidence {
    pub score: u8,
    pub tier: ConfidenceTier,
}

/// A detected pattern and its (eventual) outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    /// Log row key, `None` until appended
    pub id: Option<i64>,
    pub pair: String,
    pub timeframe: Timeframe,
    pub kind: PatternKind,
    pub geometry: PatternGeometry,
    pub base_candle_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub chart_url: String,
    pub confidence: Option<Confidence>,
    pub suggested_action: SuggestedAction,
    pub summary: String,
    pub outcome: Outcome,
}

impl Detection {
    /// Stable identity of a pattern occurrence: the same pattern on the same
    /// base candle always hashes to the same key.
    pub fn dedup_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.pair.as_bytes());
        hasher.update(b"|");
        hasher.update(self.timeframe.provider_code().as_bytes());
        hasher.update(b"|");
        hasher.update(self.kind.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(self.base_candle_time.timestamp().to_string().as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// Zone bounds for order blocks
    pub fn zone(&self) -> Option<(Decimal, Decimal)> {
        match self.geometry {
            PatternGeometry::Zone { low, high } => Some((low, high)),
            PatternGeometry::Gap { .. } => None,
        }
    }
}

/// TradingView chart link for a pair, e.g. `FX:EURUSD` at interval `240`
pub fn chart_url(pair: &str, timeframe: Timeframe) -> String {
    format!(
        "https://www.tradingview.com/chart/?symbol=FX:{}&interval={}",
        pair.replace('/', ""),
        timeframe.chart_interval()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(ConfidenceTier::from_score(0), ConfidenceTier::Tier3);
        assert_eq!(ConfidenceTier::from_score(1), ConfidenceTier::Tier3);
        assert_eq!(ConfidenceTier::from_score(2), ConfidenceTier::Tier2);
        assert_eq!(ConfidenceTier::from_score(3), ConfidenceTier::Tier2);
        assert_eq!(ConfidenceTier::from_score(4), ConfidenceTier::Tier1);
        assert_eq!(ConfidenceTier::from_score(5), ConfidenceTier::Tier1);
    }

    #[test]
    fn test_timeframe_codes() {
        assert_eq!("4h".parse::<Timeframe>().unwrap(), Timeframe::FourHour);
        assert_eq!("1day".parse::<Timeframe>().unwrap(), Timeframe::OneDay);
        assert!("15m".parse::<Timeframe>().is_err());
        assert_eq!(Timeframe::FourHour.min_dwell(), Duration::hours(6));
        assert_eq!(Timeframe::OneDay.min_dwell(), Duration::hours(48));
        assert_eq!(Timeframe::FourHour.duration(), Duration::hours(4));
        assert_eq!(Timeframe::OneDay.duration(), Duration::hours(24));
    }

    #[test]
    fn test_kind_side_mapping() {
        for side in Side::BOTH {
            assert_eq!(PatternKind::gap(side).side(), side);
            assert_eq!(PatternKind::order_block(side).side(), side);
        }
        assert!(PatternKind::GapDown.is_gap());
        assert!(!PatternKind::SellOrderBlock.is_gap());
    }

    #[test]
    fn test_suggested_action_parses_its_own_text() {
        let action = SuggestedAction::AwaitConfirmation;
        assert_eq!(action.as_str().parse::<SuggestedAction>().unwrap(), action);
        assert!("buy now".parse::<SuggestedAction>().is_err());
    }

    #[test]
    fn test_chart_url() {
        assert_eq!(
            chart_url("USD/JPY", Timeframe::OneDay),
            "https://www.tradingview.com/chart/?symbol=FX:USDJPY&interval=D"
        );
    }
}
