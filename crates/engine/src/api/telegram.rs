//! Telegram bot notifier

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::TelegramCredentials;
use crate::notify::NotificationSink;

const API_BASE_URL: &str = "https://api.telegram.org";

/// Sends messages through the Telegram Bot API. Without credentials every
/// send is a no-op.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    credentials: Option<TelegramCredentials>,
}

impl TelegramNotifier {
    pub fn new(credentials: Option<TelegramCredentials>, timeout: Duration) -> Result<Self> {
        if credentials.is_some() {
            info!("Telegram notifier initialized");
        } else {
            warn!("Telegram notifier disabled - missing TELEGRAM_TOKEN or TELEGRAM_CHAT_ID");
        }

        Ok(Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .context("Failed to build HTTP client")?,
            base_url: API_BASE_URL.to_string(),
            credentials,
        })
    }

    /// Point the notifier at another host (proxies, local mocks)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    /// POST /bot{token}/sendMessage
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let Some(credentials) = &self.credentials else {
            return Ok(());
        };

        let url = format!("{}/bot{}/sendMessage", self.base_url, credentials.bot_token);
        let payload = json!({
            "chat_id": credentials.chat_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });

        // The path carries the bot token
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API error {}: {}", status, body);
        }

        debug!("Telegram message delivered");
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn send(&self, text: &str) {
        if let Err(e) = self.send_message(text).await {
            warn!(error = %e, "Failed to send Telegram notification");
        }
    }
}
