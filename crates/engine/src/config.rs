//! Run configuration and credentials
//!
//! Built once from the environment and passed by reference to every component.

use crate::types::Timeframe;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PAIRS: [&str; 5] = ["GBP/USD", "EUR/USD", "USD/JPY", "EUR/JPY", "AUD/JPY"];
pub const DEFAULT_MIN_GAP_PIPS: Decimal = dec!(20);
pub const DEFAULT_WINDOW: usize = 5;
pub const DEFAULT_DB_PATH: &str = "data/detections.db";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Order blocks need three candles
const MIN_WINDOW: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value `{value}` for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl fmt::Display) -> Self {
        ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    pub pairs: Vec<String>,
    pub timeframes: Vec<Timeframe>,
    /// Smallest gap, in pips, that is reported
    pub min_gap_pips: Decimal,
    /// Candles fetched per pair/timeframe for detection and scoring
    pub window: usize,
    pub db_path: PathBuf,
    pub http_timeout: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            pairs: DEFAULT_PAIRS.iter().map(|p| p.to_string()).collect(),
            timeframes: Timeframe::ALL.to_vec(),
            min_gap_pips: DEFAULT_MIN_GAP_PIPS,
            window: DEFAULT_WINDOW,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source, falling back to defaults for unset keys
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("GAPWATCH_PAIRS") {
            let pairs = split_list(&raw);
            if pairs.is_empty() {
                return Err(ConfigError::invalid("GAPWATCH_PAIRS", &raw, "no pairs listed"));
            }
            if let Some(bad) = pairs.iter().find(|p| !p.contains('/')) {
                return Err(ConfigError::invalid(
                    "GAPWATCH_PAIRS",
                    &raw,
                    format!("`{bad}` is not BASE/QUOTE"),
                ));
            }
            config.pairs = pairs;
        }

        if let Some(raw) = lookup("GAPWATCH_TIMEFRAMES") {
            let timeframes = split_list(&raw)
                .iter()
                .map(|code| Timeframe::from_str(code))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ConfigError::invalid("GAPWATCH_TIMEFRAMES", &raw, e))?;
            if timeframes.is_empty() {
                return Err(ConfigError::invalid(
                    "GAPWATCH_TIMEFRAMES",
                    &raw,
                    "no timeframes listed",
                ));
            }
            config.timeframes = timeframes;
        }

        if let Some(raw) = lookup("GAPWATCH_MIN_GAP_PIPS") {
            let pips = Decimal::from_str(raw.trim())
                .map_err(|e| ConfigError::invalid("GAPWATCH_MIN_GAP_PIPS", &raw, e))?;
            if pips.is_sign_negative() {
                return Err(ConfigError::invalid(
                    "GAPWATCH_MIN_GAP_PIPS",
                    &raw,
                    "must not be negative",
                ));
            }
            config.min_gap_pips = pips;
        }

        if let Some(raw) = lookup("GAPWATCH_WINDOW") {
            let window: usize = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("GAPWATCH_WINDOW", &raw, e))?;
            if window < MIN_WINDOW {
                return Err(ConfigError::invalid(
                    "GAPWATCH_WINDOW",
                    &raw,
                    format!("must be at least {MIN_WINDOW}"),
                ));
            }
            config.window = window;
        }

        if let Some(raw) = lookup("GAPWATCH_DB_PATH") {
            config.db_path = PathBuf::from(raw);
        }

        if let Some(raw) = lookup("GAPWATCH_HTTP_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("GAPWATCH_HTTP_TIMEOUT_SECS", &raw, e))?;
            config.http_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Clone, PartialEq, Eq)]
pub struct TelegramCredentials {
    pub bot_token: String,
    pub chat_id: String,
}

impl fmt::Debug for TelegramCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramCredentials")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

/// Secrets for the external collaborators, held in memory only
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub market_data_api_key: String,
    pub telegram: Option<TelegramCredentials>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("market_data_api_key", &"<redacted>")
            .field("telegram", &self.telegram)
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let market_data_api_key = non_empty("TD_API_KEY").ok_or(ConfigError::Missing("TD_API_KEY"))?;

        let telegram = match (non_empty("TELEGRAM_TOKEN"), non_empty("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramCredentials { bot_token, chat_id }),
            _ => None,
        };

        Ok(Self {
            market_data_api_key,
            telegram,
        })
    }
}
