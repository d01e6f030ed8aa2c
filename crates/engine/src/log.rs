//! Detection log: the system of record for detections and their outcomes

use crate::types::{
    Confidence, ConfidenceTier, Detection, Outcome, PatternGeometry, PatternKind, SuggestedAction,
    Timeframe,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use persistence::repository::{DetectionRecord, DetectionRepository};
use persistence::{DbError, DbResult, SqlitePool};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Append-only table of detections whose outcome column is updated once.
#[async_trait]
pub trait DetectionLog: Send + Sync {
    /// Store a new detection. `None` when the same pattern is already logged.
    async fn append(&self, detection: &Detection) -> DbResult<Option<i64>>;

    /// Every row in insertion order, with its row key in `Detection::id`
    async fn list_all(&self) -> DbResult<Vec<Detection>>;

    /// Move a pending row to `outcome`. False if the row was not pending.
    async fn update_outcome(
        &self,
        id: i64,
        outcome: Outcome,
        resolved_at: DateTime<Utc>,
    ) -> DbResult<bool>;
}

/// `DetectionLog` backed by the SQLite `detections` table
#[derive(Clone)]
pub struct SqliteDetectionLog {
    pool: SqlitePool,
}

impl SqliteDetectionLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DetectionLog for SqliteDetectionLog {
    async fn append(&self, detection: &Detection) -> DbResult<Option<i64>> {
        DetectionRepository::new(&self.pool)
            .append(&to_record(detection))
            .await
    }

    async fn list_all(&self) -> DbResult<Vec<Detection>> {
        DetectionRepository::new(&self.pool)
            .list_all()
            .await?
            .iter()
            .map(from_record)
            .collect()
    }

    async fn update_outcome(
        &self,
        id: i64,
        outcome: Outcome,
        resolved_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        DetectionRepository::new(&self.pool)
            .update_outcome(id, outcome.as_str(), resolved_at.timestamp())
            .await
    }
}

pub fn to_record(detection: &Detection) -> DetectionRecord {
    let (zone_low, zone_high, gap_pips, gap_origin_open) = match detection.geometry {
        PatternGeometry::Zone { low, high } => {
            (Some(low.to_string()), Some(high.to_string()), None, None)
        }
        PatternGeometry::Gap {
            size_pips,
            origin_open,
        } => (
            None,
            None,
            Some(size_pips.to_string()),
            Some(origin_open.to_string()),
        ),
    };

    DetectionRecord {
        id: detection.id,
        dedup_key: detection.dedup_key(),
        pair: detection.pair.clone(),
        timeframe: detection.timeframe.provider_code().to_string(),
        kind: detection.kind.as_str().to_string(),
        zone_low,
        zone_high,
        gap_pips,
        gap_origin_open,
        base_candle_time: detection.base_candle_time.timestamp(),
        chart_url: detection.chart_url.clone(),
        summary: detection.summary.clone(),
        suggested_action: detection.suggested_action.as_str().to_string(),
        confidence_tier: detection.confidence.map(|c| c.tier.as_str().to_string()),
        score: detection.confidence.map(|c| i64::from(c.score)),
        outcome: detection.outcome.as_str().to_string(),
        created_at: detection.created_at.timestamp(),
        resolved_at: None,
    }
}

/// Decode a stored row; any unreadable column is a schema mismatch
pub fn from_record(record: &DetectionRecord) -> DbResult<Detection> {
    let id = record.id.unwrap_or_default();
    let invalid = |reason: String| DbError::InvalidRow { id, reason };

    let decimal = |column: &str, value: &Option<String>| -> DbResult<Decimal> {
        let raw = value
            .as_deref()
            .ok_or_else(|| invalid(format!("{column} is empty")))?;
        Decimal::from_str(raw).map_err(|e| invalid(format!("{column}: {e}")))
    };
    let timestamp = |column: &str, secs: i64| -> DbResult<DateTime<Utc>> {
        DateTime::from_timestamp(secs, 0).ok_or_else(|| invalid(format!("{column} out of range")))
    };

    let kind = PatternKind::from_str(&record.kind).map_err(|e| invalid(e.to_string()))?;
    let geometry = if kind.is_gap() {
        PatternGeometry::Gap {
            size_pips: decimal("gap_pips", &record.gap_pips)?,
            origin_open: decimal("gap_origin_open", &record.gap_origin_open)?,
        }
    } else {
        let low = decimal("zone_low", &record.zone_low)?;
        let high = decimal("zone_high", &record.zone_high)?;
        if low > high {
            return Err(invalid(format!("zone_low {low} above zone_high {high}")));
        }
        PatternGeometry::Zone { low, high }
    };

    let confidence = match (&record.confidence_tier, record.score) {
        (Some(tier), Some(score)) => Some(Confidence {
            tier: ConfidenceTier::from_str(tier).map_err(|e| invalid(e.to_string()))?,
            score: u8::try_from(score).map_err(|e| invalid(format!("score: {e}")))?,
        }),
        _ => None,
    };

    Ok(Detection {
        id: record.id,
        pair: record.pair.clone(),
        timeframe: Timeframe::from_str(&record.timeframe).map_err(|e| invalid(e.to_string()))?,
        kind,
        geometry,
        base_candle_time: timestamp("base_candle_time", record.base_candle_time)?,
        created_at: timestamp("created_at", record.created_at)?,
        chart_url: record.chart_url.clone(),
        confidence,
        suggested_action: SuggestedAction::from_str(&record.suggested_action)
            .map_err(|e| invalid(e.to_string()))?,
        summary: record.summary.clone(),
        outcome: Outcome::from_str(&record.outcome).map_err(|e| invalid(e.to_string()))?,
    })
}
