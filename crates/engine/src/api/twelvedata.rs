//! Twelve Data REST client for forex candles and RSI

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use super::MarketDataClient;
use crate::types::{Candle, Timeframe};

const DEFAULT_BASE_URL: &str = "https://api.twelvedata.com";

/// Twelve Data market data client
#[derive(Clone)]
pub struct TwelveDataClient {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Raw candle from `/time_series` (all values are strings)
#[derive(Debug, Deserialize)]
struct RawCandle {
    datetime: String,
    open: String,
    high: String,
    low: String,
    close: String,
}

#[derive(Debug, Deserialize)]
struct RawRsi {
    rsi: String,
}

/// Envelope shared by all endpoints; errors come back with HTTP 200 and
/// `status: "error"`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default = "Vec::new")]
    values: Vec<T>,
}

impl<T> Envelope<T> {
    fn into_values(self) -> Result<Vec<T>> {
        if self.status.as_deref() == Some("error") {
            anyhow::bail!(
                "Twelve Data error: {}",
                self.message.unwrap_or_else(|| "unknown".to_string())
            );
        }
        Ok(self.values)
    }
}

impl TwelveDataClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .context("Failed to build HTTP client")?,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Point the client at another host (proxies, local mocks)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch the `count` most recent candles, returned oldest-first
    pub async fn get_time_series(
        &self,
        symbol: &str,
        interval: &str,
        count: usize,
    ) -> Result<Vec<Candle>> {
        debug!(symbol, interval, count, "Fetching time series");

        let outputsize = count.to_string();
        let response = self
            .client
            .get(format!("{}/time_series", self.base_url))
            .query(&[
                ("symbol", symbol),
                ("interval", interval),
                ("outputsize", outputsize.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            // The query string carries the API key
            .map_err(reqwest::Error::without_url)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Twelve Data API error {}: {}", status, body);
        }

        let body = response.text().await.map_err(reqwest::Error::without_url)?;
        let candles = parse_time_series(&body)?;
        debug!(count = candles.len(), "Fetched candles");
        Ok(candles)
    }

    /// Latest RSI value, `None` when the provider returns no values
    pub async fn get_rsi(&self, symbol: &str, interval: &str) -> Result<Option<Decimal>> {
        let response = self
            .client
            .get(format!("{}/rsi", self.base_url))
            .query(&[
                ("symbol", symbol),
                ("interval", interval),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Twelve Data API error {}: {}", status, body);
        }

        let body = response.text().await.map_err(reqwest::Error::without_url)?;
        parse_rsi(&body)
    }
}

#[async_trait]
impl MarketDataClient for TwelveDataClient {
    async fn fetch_candles(&self, pair: &str, timeframe: Timeframe, count: usize) -> Vec<Candle> {
        match self
            .get_time_series(pair, timeframe.provider_code(), count)
            .await
        {
            Ok(candles) => candles,
            Err(e) => {
                warn!(pair, %timeframe, error = %e, "Candle fetch failed");
                Vec::new()
            }
        }
    }

    async fn fetch_momentum(&self, pair: &str, timeframe: Timeframe) -> Option<Decimal> {
        match self.get_rsi(pair, timeframe.provider_code()).await {
            Ok(rsi) => rsi,
            Err(e) => {
                warn!(pair, %timeframe, error = %e, "RSI fetch failed");
                None
            }
        }
    }
}

/// Parse a `/time_series` body. The provider lists newest-first; the result is oldest-first.
fn parse_time_series(body: &str) -> Result<Vec<Candle>> {
    let envelope: Envelope<RawCandle> = serde_json::from_str(body)?;
    let mut candles = envelope
        .into_values()?
        .into_iter()
        .map(|raw| -> Result<Candle> {
            Ok(Candle {
                time: parse_datetime(&raw.datetime)?,
                open: Decimal::from_str(&raw.open)?,
                high: Decimal::from_str(&raw.high)?,
                low: Decimal::from_str(&raw.low)?,
                close: Decimal::from_str(&raw.close)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    candles.sort_by_key(|c| c.time);
    Ok(candles)
}

fn parse_rsi(body: &str) -> Result<Option<Decimal>> {
    let envelope: Envelope<RawRsi> = serde_json::from_str(body)?;
    envelope
        .into_values()?
        .first()
        .map(|v| Decimal::from_str(&v.rsi).map_err(anyhow::Error::from))
        .transpose()
}

/// Intraday candles carry a time, daily candles only a date
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Unrecognized candle datetime `{s}`"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .with_context(|| format!("Invalid candle date `{s}`"))?;
    Ok(midnight.and_utc())
}
