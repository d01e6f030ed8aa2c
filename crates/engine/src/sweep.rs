//! One full run: detect on every pair/timeframe, then resolve pending rows.
//!
//! A failed fetch skips only its own pair/timeframe (or row). Only detection
//! log failures abort the run, since the log is the system of record.

use crate::api::MarketDataClient;
use crate::config::BotConfig;
use crate::detectors::{
    completed_candles, detect_gap, detect_order_blocks, GapPattern, OrderBlockPattern,
};
use crate::error::SweepError;
use crate::log::DetectionLog;
use crate::notify::{self, NotificationSink};
use crate::resolver::{is_due, resolve};
use crate::scoring::{score_order_block, NEUTRAL_OSCILLATOR};
use crate::types::{
    chart_url, Candle, Confidence, Detection, Outcome, PatternGeometry, SuggestedAction, Timeframe,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Everything a sweep talks to, built once per process
pub struct SweepContext<'a> {
    pub config: &'a BotConfig,
    pub market: &'a dyn MarketDataClient,
    pub notifier: &'a dyn NotificationSink,
    pub log: &'a dyn DetectionLog,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Pair/timeframe combinations attempted
    pub units: usize,
    /// Combinations skipped because no candles came back
    pub skipped_units: usize,
    /// New rows appended to the log
    pub detections: usize,
    /// Patterns already present in the log
    pub duplicates: usize,
    /// Pending rows that reached a terminal outcome
    pub resolved: usize,
    /// Pending rows left pending
    pub still_pending: usize,
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} units ({} skipped), {} new detections ({} duplicates), {} resolved, {} still pending",
            self.units,
            self.skipped_units,
            self.detections,
            self.duplicates,
            self.resolved,
            self.still_pending
        )
    }
}

type WindowCache = HashMap<(String, Timeframe), Vec<Candle>>;

/// Run one detection + resolution pass as of `now`
pub async fn run_sweep(
    ctx: &SweepContext<'_>,
    now: DateTime<Utc>,
) -> Result<SweepReport, SweepError> {
    let mut report = SweepReport::default();
    let mut windows = WindowCache::new();

    info!(
        pairs = ctx.config.pairs.len(),
        timeframes = ctx.config.timeframes.len(),
        "Sweep started"
    );

    for pair in &ctx.config.pairs {
        for &timeframe in &ctx.config.timeframes {
            report.units += 1;

            // One extra for the bar still forming
            let window = ctx
                .market
                .fetch_candles(pair, timeframe, ctx.config.window + 1)
                .await;
            if window.is_empty() {
                warn!(pair = %pair, %timeframe, "No candles, skipping");
                report.skipped_units += 1;
                continue;
            }

            detect_unit(ctx, pair, timeframe, &window, now, &mut report).await?;
            windows.insert((pair.clone(), timeframe), window);
        }
    }

    resolve_pending(ctx, &windows, now, &mut report).await?;

    info!(%report, "Sweep complete");
    Ok(report)
}

async fn detect_unit(
    ctx: &SweepContext<'_>,
    pair: &str,
    timeframe: Timeframe,
    window: &[Candle],
    now: DateTime<Utc>,
    report: &mut SweepReport,
) -> Result<(), SweepError> {
    if let Some(gap) = detect_gap(pair, window, ctx.config.min_gap_pips) {
        let detection = gap_detection(pair, timeframe, &gap, now);
        let message = notify::gap_message(&detection, &gap);
        record(ctx, &detection, &message, report).await?;
    }

    // Order blocks read closes, so the forming bar is excluded
    let closed = completed_candles(window, timeframe, now);
    let blocks = detect_order_blocks(closed);
    if blocks.is_empty() {
        return Ok(());
    }

    let oscillator = match ctx.market.fetch_momentum(pair, timeframe).await {
        Some(value) => value,
        None => {
            debug!(pair, %timeframe, "No oscillator value, using neutral");
            NEUTRAL_OSCILLATOR
        }
    };

    for block in &blocks {
        let detection = order_block_detection(pair, timeframe, block, oscillator, closed, now);
        let message = notify::order_block_message(&detection);
        record(ctx, &detection, &message, report).await?;
    }

    Ok(())
}

/// Append first, then notify only if the row is new
async fn record(
    ctx: &SweepContext<'_>,
    detection: &Detection,
    message: &str,
    report: &mut SweepReport,
) -> Result<(), SweepError> {
    match ctx.log.append(detection).await? {
        Some(row) => {
            info!(
                row,
                pair = %detection.pair,
                timeframe = %detection.timeframe,
                kind = detection.kind.as_str(),
                "Pattern detected"
            );
            ctx.notifier.send(message).await;
            report.detections += 1;
        }
        None => {
            debug!(
                pair = %detection.pair,
                timeframe = %detection.timeframe,
                kind = detection.kind.as_str(),
                "Pattern already logged"
            );
            report.duplicates += 1;
        }
    }
    Ok(())
}

fn gap_detection(
    pair: &str,
    timeframe: Timeframe,
    gap: &GapPattern,
    now: DateTime<Utc>,
) -> Detection {
    Detection {
        id: None,
        pair: pair.to_string(),
        timeframe,
        kind: gap.kind(),
        geometry: PatternGeometry::Gap {
            size_pips: gap.size_pips,
            origin_open: gap.origin_open,
        },
        base_candle_time: gap.origin_time,
        created_at: now,
        chart_url: chart_url(pair, timeframe),
        confidence: None,
        suggested_action: SuggestedAction::WatchForFill,
        summary: String::new(),
        outcome: Outcome::Pending,
    }
}

fn order_block_detection(
    pair: &str,
    timeframe: Timeframe,
    block: &OrderBlockPattern,
    oscillator: Decimal,
    window: &[Candle],
    now: DateTime<Utc>,
) -> Detection {
    let card = score_order_block(block.side, block.zone_low, block.zone_high, oscillator, window);

    Detection {
        id: None,
        pair: pair.to_string(),
        timeframe,
        kind: block.kind(),
        geometry: PatternGeometry::Zone {
            low: block.zone_low,
            high: block.zone_high,
        },
        base_candle_time: block.base_time,
        created_at: now,
        chart_url: chart_url(pair, timeframe),
        confidence: Some(Confidence {
            score: card.score,
            tier: card.tier,
        }),
        suggested_action: card.action,
        summary: notify::order_block_summary(&card),
        outcome: Outcome::Pending,
    }
}

/// Check every pending row that is old enough against the latest close
async fn resolve_pending(
    ctx: &SweepContext<'_>,
    windows: &WindowCache,
    now: DateTime<Utc>,
    report: &mut SweepReport,
) -> Result<(), SweepError> {
    let pending: Vec<Detection> = ctx
        .log
        .list_all()
        .await?
        .into_iter()
        .filter(|d| d.outcome == Outcome::Pending)
        .collect();

    debug!(count = pending.len(), "Checking pending detections");

    for detection in &pending {
        let Some(row) = detection.id else {
            continue;
        };

        if !is_due(detection, now) {
            report.still_pending += 1;
            continue;
        }

        let latest = match windows.get(&(detection.pair.clone(), detection.timeframe)) {
            Some(window) => window.last().cloned(),
            None => ctx
                .market
                .fetch_candles(&detection.pair, detection.timeframe, 1)
                .await
                .pop(),
        };
        let Some(latest) = latest else {
            warn!(row, pair = %detection.pair, timeframe = %detection.timeframe, "No price to resolve against");
            report.still_pending += 1;
            continue;
        };

        let outcome = resolve(detection, now, &latest);
        if !outcome.is_terminal() {
            report.still_pending += 1;
            continue;
        }

        if ctx.log.update_outcome(row, outcome, now).await? {
            info!(row, pair = %detection.pair, outcome = outcome.as_str(), "Detection resolved");
            ctx.notifier
                .send(&notify::outcome_message(detection, outcome))
                .await;
            report.resolved += 1;
        } else {
            debug!(row, "Row left pending elsewhere");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::tests::candle;
    use crate::log::SqliteDetectionLog;
    use crate::types::PatternKind;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use persistence::Database;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    /// Serves fixed windows; pairs without an entry fail like a dead provider
    #[derive(Default)]
    struct FakeMarket {
        windows: Mutex<HashMap<(String, Timeframe), Vec<Candle>>>,
        oscillator: Option<Decimal>,
    }

    impl FakeMarket {
        fn set(&self, pair: &str, timeframe: Timeframe, window: Vec<Candle>) {
            self.windows
                .lock()
                .unwrap()
                .insert((pair.to_string(), timeframe), window);
        }
    }

    #[async_trait]
    impl MarketDataClient for FakeMarket {
        async fn fetch_candles(&self, pair: &str, timeframe: Timeframe, count: usize) -> Vec<Candle> {
            let windows = self.windows.lock().unwrap();
            let window = windows
                .get(&(pair.to_string(), timeframe))
                .cloned()
                .unwrap_or_default();
            window[window.len().saturating_sub(count)..].to_vec()
        }

        async fn fetch_momentum(&self, _pair: &str, _timeframe: Timeframe) -> Option<Decimal> {
            self.oscillator
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, text: &str) {
            self.messages.lock().unwrap().push(text.to_string());
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
    }

    fn config(pairs: &[&str]) -> BotConfig {
        BotConfig {
            pairs: pairs.iter().map(|p| p.to_string()).collect(),
            timeframes: vec![Timeframe::FourHour],
            ..BotConfig::default()
        }
    }

    /// Bearish base, bullish confirm, bullish continuation; no gap between candles
    fn buy_block_window() -> Vec<Candle> {
        vec![
            candle(0, dec!(1.0900), dec!(1.0910), dec!(1.0850), dec!(1.0860)),
            candle(4, dec!(1.0860), dec!(1.0920), dec!(1.0855), dec!(1.0915)),
            candle(8, dec!(1.0915), dec!(1.0960), dec!(1.0910), dec!(1.0950)),
        ]
    }

    /// Flat candles with a 20-pip gap up on the last open
    fn gap_window() -> Vec<Candle> {
        vec![
            candle(0, dec!(110.00), dec!(110.05), dec!(109.95), dec!(110.00)),
            candle(4, dec!(110.20), dec!(110.25), dec!(110.15), dec!(110.20)),
        ]
    }

    fn flat(price: Decimal) -> Vec<Candle> {
        vec![candle(20, price, price, price, price)]
    }

    async fn sweep(
        config: &BotConfig,
        market: &FakeMarket,
        sink: &RecordingSink,
        log: &SqliteDetectionLog,
        now: DateTime<Utc>,
    ) -> SweepReport {
        let ctx = SweepContext {
            config,
            market,
            notifier: sink,
            log,
        };
        run_sweep(&ctx, now).await.unwrap()
    }

    #[tokio::test]
    async fn test_detects_logs_and_notifies() {
        let db = Database::in_memory().await.unwrap();
        let log = SqliteDetectionLog::new(db.pool_clone());
        let market = FakeMarket::default();
        market.set("EUR/USD", Timeframe::FourHour, buy_block_window());
        market.set("USD/JPY", Timeframe::FourHour, gap_window());
        let sink = RecordingSink::default();
        let config = config(&["EUR/USD", "USD/JPY"]);

        let report = sweep(&config, &market, &sink, &log, t0()).await;

        assert_eq!(report.units, 2);
        assert_eq!(report.detections, 2);
        assert_eq!(report.still_pending, 2);

        let rows = log.list_all().await.unwrap();
        assert_eq!(rows[0].kind, PatternKind::BuyOrderBlock);
        assert_eq!(rows[0].zone(), Some((dec!(1.0850), dec!(1.0910))));
        assert!(rows[0].confidence.is_some());
        assert_eq!(rows[1].kind, PatternKind::GapUp);
        assert_eq!(rows[1].created_at, t0());

        let messages = sink.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("BUY ORDER BLOCK"));
        // Missing oscillator falls back to neutral
        assert!(messages[0].contains("RSI: 50"));
        assert!(messages[1].contains("GAP UP"));
    }

    #[tokio::test]
    async fn test_unchanged_window_is_not_logged_twice() {
        let db = Database::in_memory().await.unwrap();
        let log = SqliteDetectionLog::new(db.pool_clone());
        let market = FakeMarket::default();
        market.set("EUR/USD", Timeframe::FourHour, buy_block_window());
        let sink = RecordingSink::default();
        let config = config(&["EUR/USD"]);

        sweep(&config, &market, &sink, &log, t0()).await;
        let second = sweep(&config, &market, &sink, &log, t0() + Duration::hours(1)).await;

        assert_eq!(second.detections, 0);
        assert_eq!(second.duplicates, 1);
        assert_eq!(log.list_all().await.unwrap().len(), 1);
        assert_eq!(sink.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_pair_does_not_stop_the_sweep() {
        let db = Database::in_memory().await.unwrap();
        let log = SqliteDetectionLog::new(db.pool_clone());
        let market = FakeMarket::default();
        // GBP/USD has no data: the fake behaves like a failing provider
        market.set("USD/JPY", Timeframe::FourHour, gap_window());
        let sink = RecordingSink::default();
        let config = config(&["GBP/USD", "USD/JPY"]);

        let report = sweep(&config, &market, &sink, &log, t0()).await;

        assert_eq!(report.units, 2);
        assert_eq!(report.skipped_units, 1);
        assert_eq!(report.detections, 1);
        assert_eq!(log.list_all().await.unwrap()[0].pair, "USD/JPY");
    }

    #[tokio::test]
    async fn test_pending_row_resolves_after_dwell() {
        let db = Database::in_memory().await.unwrap();
        let log = SqliteDetectionLog::new(db.pool_clone());
        let market = FakeMarket::default();
        market.set("EUR/USD", Timeframe::FourHour, buy_block_window());
        let sink = RecordingSink::default();
        let config = config(&["EUR/USD"]);

        sweep(&config, &market, &sink, &log, t0()).await;

        // Price back inside the zone, but too early
        market.set("EUR/USD", Timeframe::FourHour, flat(dec!(1.0880)));
        let early = sweep(&config, &market, &sink, &log, t0() + Duration::hours(5)).await;
        assert_eq!(early.resolved, 0);
        assert_eq!(early.still_pending, 1);

        let due = sweep(&config, &market, &sink, &log, t0() + Duration::hours(6)).await;
        assert_eq!(due.resolved, 1);
        assert_eq!(log.list_all().await.unwrap()[0].outcome, Outcome::Respected);
        assert!(sink.messages().last().unwrap().contains("Respected"));

        // Terminal rows are not revisited, whatever the price does
        market.set("EUR/USD", Timeframe::FourHour, flat(dec!(1.0500)));
        let after = sweep(&config, &market, &sink, &log, t0() + Duration::hours(30)).await;
        assert_eq!(after.resolved, 0);
        assert_eq!(after.still_pending, 0);
        assert_eq!(log.list_all().await.unwrap()[0].outcome, Outcome::Respected);
    }

    #[tokio::test]
    async fn test_resolution_fetches_pairs_outside_the_sweep() {
        let db = Database::in_memory().await.unwrap();
        let log = SqliteDetectionLog::new(db.pool_clone());
        let market = FakeMarket::default();
        market.set("USD/JPY", Timeframe::FourHour, gap_window());
        let sink = RecordingSink::default();

        sweep(&config(&["USD/JPY"]), &market, &sink, &log, t0()).await;

        // USD/JPY is no longer swept but its pending gap is still resolved
        market.set("USD/JPY", Timeframe::FourHour, flat(dec!(110.30)));
        let report = sweep(&config(&[]), &market, &sink, &log, t0() + Duration::hours(7)).await;
        assert_eq!(report.units, 0);
        assert_eq!(report.resolved, 1);
        assert_eq!(log.list_all().await.unwrap()[0].outcome, Outcome::NotFilled);
    }

    #[tokio::test]
    async fn test_missing_price_keeps_row_pending() {
        let db = Database::in_memory().await.unwrap();
        let log = SqliteDetectionLog::new(db.pool_clone());
        let market = FakeMarket::default();
        market.set("USD/JPY", Timeframe::FourHour, gap_window());
        let sink = RecordingSink::default();

        sweep(&config(&["USD/JPY"]), &market, &sink, &log, t0()).await;

        market.set("USD/JPY", Timeframe::FourHour, Vec::new());
        let report = sweep(&config(&[]), &market, &sink, &log, t0() + Duration::hours(7)).await;
        assert_eq!(report.still_pending, 1);
        assert_eq!(log.list_all().await.unwrap()[0].outcome, Outcome::Pending);
    }

    /// Buy block whose continuation is the 12:00 bar
    fn buy_block_ending_at_noon(continuation_close: Decimal) -> Vec<Candle> {
        vec![
            candle(4, dec!(1.0900), dec!(1.0910), dec!(1.0850), dec!(1.0860)),
            candle(8, dec!(1.0860), dec!(1.0920), dec!(1.0855), dec!(1.0915)),
            candle(12, dec!(1.0915), dec!(1.0960), dec!(1.0890), continuation_close),
        ]
    }

    #[tokio::test]
    async fn test_forming_bar_does_not_complete_an_order_block() {
        let db = Database::in_memory().await.unwrap();
        let log = SqliteDetectionLog::new(db.pool_clone());
        let market = FakeMarket::default();
        let sink = RecordingSink::default();
        let config = config(&["EUR/USD"]);
        let at = |hour| Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap();

        // Mid-bar the live price sits above the confirm close
        market.set("EUR/USD", Timeframe::FourHour, buy_block_ending_at_noon(dec!(1.0950)));
        let forming = sweep(&config, &market, &sink, &log, at(13)).await;
        assert_eq!(forming.detections, 0);
        assert!(sink.messages().is_empty());

        // The bar then closes below it: never a block
        market.set("EUR/USD", Timeframe::FourHour, buy_block_ending_at_noon(dec!(1.0900)));
        let closed = sweep(&config, &market, &sink, &log, at(16)).await;
        assert_eq!(closed.detections, 0);
        assert!(log.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_block_fires_once_the_bar_closes() {
        let db = Database::in_memory().await.unwrap();
        let log = SqliteDetectionLog::new(db.pool_clone());
        let market = FakeMarket::default();
        let sink = RecordingSink::default();
        let config = config(&["EUR/USD"]);
        let at = |hour| Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap();

        let mut window = buy_block_ending_at_noon(dec!(1.0950));
        // Live 16:00 bar behind the closed pattern
        window.push(candle(16, dec!(1.0950), dec!(1.0955), dec!(1.0940), dec!(1.0945)));
        market.set("EUR/USD", Timeframe::FourHour, window);

        let report = sweep(&config, &market, &sink, &log, at(17)).await;
        assert_eq!(report.detections, 1);
        let rows = log.list_all().await.unwrap();
        assert_eq!(rows[0].kind, PatternKind::BuyOrderBlock);
        assert_eq!(rows[0].base_candle_time, at(4));
    }
}
