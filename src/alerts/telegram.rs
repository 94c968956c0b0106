//! Telegram bot alerts.
//!
//! API: `POST https://api.telegram.org/bot{token}/sendMessage`
//! Body: `{"chat_id": ..., "text": ...}`

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, warn};

use super::AlertSink;

const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

pub struct TelegramAlerts {
    http: Client,
    api_url: String,
    bot_token: SecretString,
    chat_id: String,
}

impl TelegramAlerts {
    pub fn new(bot_token: SecretString, chat_id: String, timeout: Duration) -> Result<Self> {
        Self::with_api_url(DEFAULT_API_URL, bot_token, chat_id, timeout)
    }

    pub fn with_api_url(
        api_url: &str,
        bot_token: SecretString,
        chat_id: String,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for Telegram")?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
        })
    }

    async fn send(&self, text: &str) -> Result<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_url,
            self.bot_token.expose_secret()
        );
        let resp = self
            .http
            .post(&url)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text,
            })
            .send()
            .await
            // The URL carries the bot token.
            .map_err(|e| e.without_url())
            .context("Telegram request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API error {status}: {body}");
        }
        Ok(())
    }
}

#[async_trait]
impl AlertSink for TelegramAlerts {
    async fn notify(&self, message: &str) {
        match self.send(message).await {
            Ok(()) => debug!("Alert delivered"),
            Err(e) => warn!(error = %format!("{e:#}"), "Alert delivery failed"),
        }
    }
}
