//! Gapwatch Engine — forex gap and order-block detection
//!
//! Provides:
//! - Gap and order-block detectors over oldest-first candle windows
//! - Order-block confidence scoring (0-5, three tiers, suggested action)
//! - Outcome resolution of pending detections after a per-timeframe dwell
//! - Twelve Data market data client and Telegram notifier
//! - The sweep orchestrator tying detection, logging, notification, and resolution together

pub mod api;
pub mod config;
pub mod detectors;
pub mod error;
pub mod log;
pub mod notify;
pub mod pips;
pub mod resolver;
pub mod scoring;
pub mod sweep;
pub mod types;

// Re-exports for convenience
pub use api::{MarketDataClient, TelegramNotifier, TwelveDataClient};
pub use config::{BotConfig, ConfigError, Credentials, TelegramCredentials};
pub use detectors::{detect_gap, detect_order_block, detect_order_blocks, GapPattern, OrderBlockPattern};
pub use error::{ParseEnumError, SweepError};
pub use log::{DetectionLog, SqliteDetectionLog};
pub use notify::NotificationSink;
pub use resolver::{is_due, resolve};
pub use scoring::{score_order_block, ScoreCard, Signals};
pub use sweep::{run_sweep, SweepContext, SweepReport};
pub use types::*;
