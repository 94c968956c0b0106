//! HTTP mark-price oracle.
//!
//! Reference venue: `GET {reference}/fapi/v1/premiumIndex?symbol=BTCUSDT`
//! Exchange-under-test: `GET {exchange}/api/v1/markPrice?symbol=BTCUSDCPERP`
//! Auth: none on either endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, warn};

use super::{extract_price, external_symbol, parse_price, PriceSource};
use crate::exchange::backend_symbol;
use crate::types::{PairConfig, PriceError, PriceSourceKind};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_REFERENCE_URL: &str = "https://fapi.binance.com";
pub const REFERENCE_MARK_PRICE_PATH: &str = "/fapi/v1/premiumIndex";
pub const EXCHANGE_MARK_PRICE_PATH: &str = "/api/v1/markPrice";

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

pub struct MarkPriceOracle {
    http: Client,
    reference_url: String,
    exchange_url: String,
}

impl MarkPriceOracle {
    pub fn new(reference_url: &str, exchange_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("MMSIM/0.1.0")
            .build()
            .context("Failed to build HTTP client for price oracle")?;

        Ok(Self {
            http,
            reference_url: reference_url.trim_end_matches('/').to_string(),
            exchange_url: exchange_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET a price endpoint and return the raw price field, if any.
    async fn fetch_raw(&self, url: &str, symbol: &str) -> Result<Option<String>, PriceError> {
        let unavailable = |reason: String| PriceError::Unavailable {
            symbol: symbol.to_string(),
            reason,
        };

        debug!(url = %url, symbol, "Fetching mark price");

        let resp = self
            .http
            .get(url)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .map_err(|e| unavailable(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(unavailable(format!("HTTP {status}: {body}")));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| unavailable(format!("malformed response: {e}")))?;

        Ok(extract_price(&body))
    }

    async fn reference_price(&self, pair: &PairConfig) -> Result<Decimal, PriceError> {
        let symbol = external_symbol(&pair.symbol);
        let url = format!("{}{}", self.reference_url, REFERENCE_MARK_PRICE_PATH);
        match self.fetch_raw(&url, &symbol).await? {
            Some(raw) => parse_price(&symbol, &raw),
            None => Err(PriceError::Unavailable {
                symbol,
                reason: "response has no price field".into(),
            }),
        }
    }

    /// Exchange's own mark price, then the pair's static fallback.
    async fn exchange_price(&self, pair: &PairConfig) -> Result<Decimal, PriceError> {
        let symbol = backend_symbol(&pair.symbol);
        let url = format!("{}{}", self.exchange_url, EXCHANGE_MARK_PRICE_PATH);

        let failure = match self.fetch_raw(&url, &symbol).await {
            Ok(Some(raw)) => match parse_price(&symbol, &raw) {
                Ok(price) => return Ok(price),
                Err(e) => e,
            },
            Ok(None) => PriceError::Unavailable {
                symbol: symbol.clone(),
                reason: "response has no price field".into(),
            },
            Err(e) => e,
        };

        match pair.fallback_price {
            Some(nominal) => {
                warn!(
                    pair = %pair.symbol,
                    error = %failure,
                    fallback = %nominal,
                    "Exchange mark price unavailable, using static fallback"
                );
                parse_price(&pair.symbol, &nominal.to_string())
            }
            None => Err(failure),
        }
    }
}

#[async_trait]
impl PriceSource for MarkPriceOracle {
    async fn mark_price(&self, pair: &PairConfig) -> Result<Decimal, PriceError> {
        match pair.price_source {
            PriceSourceKind::External => self.reference_price(pair).await,
            PriceSourceKind::Exchange => self.exchange_price(pair).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
