//! Database schema definitions

/// SQL to create all tables
/// NOTE: prices are stored as TEXT to preserve rust_decimal::Decimal precision,
/// timestamps as unix seconds.
pub const CREATE_TABLES: &str = r#"
-- Detection log: one row per detected pattern, outcome updated once
CREATE TABLE IF NOT EXISTS detections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    dedup_key TEXT NOT NULL UNIQUE,
    pair TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    kind TEXT NOT NULL,
    zone_low TEXT,
    zone_high TEXT,
    gap_pips TEXT,
    base_candle_time INTEGER NOT NULL,
    chart_url TEXT NOT NULL,
    summary TEXT NOT NULL DEFAULT '',
    suggested_action TEXT NOT NULL,
    confidence_tier TEXT,
    outcome TEXT NOT NULL DEFAULT 'pending',
    created_at INTEGER NOT NULL
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_detections_outcome ON detections(outcome);
CREATE INDEX IF NOT EXISTS idx_detections_pair ON detections(pair, timeframe)
"#;

/// Columns appended after the first release. Each statement is applied on every
/// start; "duplicate column name" means it already ran.
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE detections ADD COLUMN gap_origin_open TEXT",
    "ALTER TABLE detections ADD COLUMN score INTEGER",
    "ALTER TABLE detections ADD COLUMN resolved_at INTEGER",
];
