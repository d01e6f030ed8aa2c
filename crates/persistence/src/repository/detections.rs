//! Detection log repository — append, list, and resolve detected patterns

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Outcome value of a row that has not resolved yet
pub const OUTCOME_PENDING: &str = "pending";

const SELECT_COLUMNS: &str = r#"
    id, dedup_key, pair, timeframe, kind,
    zone_low, zone_high, gap_pips, gap_origin_open,
    base_candle_time, chart_url, summary, suggested_action,
    confidence_tier, score, outcome, created_at, resolved_at
"#;

/// A single row of the detection log
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DetectionRecord {
    pub id: Option<i64>,
    pub dedup_key: String,
    pub pair: String,
    pub timeframe: String,
    pub kind: String,
    pub zone_low: Option<String>,
    pub zone_high: Option<String>,
    pub gap_pips: Option<String>,
    // Added via migration
    pub gap_origin_open: Option<String>,
    pub base_candle_time: i64,
    pub chart_url: String,
    pub summary: String,
    pub suggested_action: String,
    pub confidence_tier: Option<String>,
    // Added via migration
    pub score: Option<i64>,
    pub outcome: String,
    pub created_at: i64,
    // Added via migration
    pub resolved_at: Option<i64>,
}

/// Repository for the detection log
pub struct DetectionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DetectionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a detection (INSERT OR IGNORE by dedup_key).
    /// Returns the new row id, or `None` when the pattern was already logged.
    pub async fn append(&self, record: &DetectionRecord) -> DbResult<Option<i64>> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO detections (
                dedup_key, pair, timeframe, kind,
                zone_low, zone_high, gap_pips, gap_origin_open,
                base_candle_time, chart_url, summary, suggested_action,
                confidence_tier, score, outcome, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.dedup_key)
        .bind(&record.pair)
        .bind(&record.timeframe)
        .bind(&record.kind)
        .bind(&record.zone_low)
        .bind(&record.zone_high)
        .bind(&record.gap_pips)
        .bind(&record.gap_origin_open)
        .bind(record.base_candle_time)
        .bind(&record.chart_url)
        .bind(&record.summary)
        .bind(&record.suggested_action)
        .bind(&record.confidence_tier)
        .bind(record.score)
        .bind(&record.outcome)
        .bind(record.created_at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(result.last_insert_rowid()))
    }

    /// All rows in insertion order
    pub async fn list_all(&self) -> DbResult<Vec<DetectionRecord>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM detections ORDER BY id ASC");
        let records = sqlx::query_as::<_, DetectionRecord>(&sql)
            .fetch_all(self.pool)
            .await?;

        Ok(records)
    }

    /// Most recent rows first, optionally filtered by outcome
    pub async fn list_recent(
        &self,
        outcome: Option<&str>,
        limit: i64,
    ) -> DbResult<Vec<DetectionRecord>> {
        let records = match outcome {
            Some(outcome) => {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM detections WHERE outcome = ? ORDER BY id DESC LIMIT ?"
                );
                sqlx::query_as::<_, DetectionRecord>(&sql)
                    .bind(outcome)
                    .bind(limit)
                    .fetch_all(self.pool)
                    .await?
            }
            None => {
                let sql =
                    format!("SELECT {SELECT_COLUMNS} FROM detections ORDER BY id DESC LIMIT ?");
                sqlx::query_as::<_, DetectionRecord>(&sql)
                    .bind(limit)
                    .fetch_all(self.pool)
                    .await?
            }
        };

        Ok(records)
    }

    /// Move a pending row to a terminal outcome.
    /// Returns false when the row does not exist or already left `pending`.
    pub async fn update_outcome(&self, id: i64, outcome: &str, resolved_at: i64) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE detections SET outcome = ?1, resolved_at = ?2 WHERE id = ?3 AND outcome = ?4",
        )
        .bind(outcome)
        .bind(resolved_at)
        .bind(id)
        .bind(OUTCOME_PENDING)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
