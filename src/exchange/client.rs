//! Signed HTTP client for the exchange-under-test.
//!
//! Endpoints:
//! - `DELETE /api/v1/openOrders` — cancel all open orders for a symbol
//! - `POST /api/v1/order` — place one order
//!
//! Both send a signed `application/x-www-form-urlencoded` body and the
//! API key in the `X-API-KEY` header. HTTP 401 means the credential has
//! expired and is reported as `ExchangeError::CredentialExpired`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use super::{backend_symbol, Exchange};
use crate::signer::RequestSigner;
use crate::types::{ExchangeError, OrderIntent, PairConfig};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const CANCEL_ALL_PATH: &str = "/api/v1/openOrders";
pub const ORDER_PATH: &str = "/api/v1/order";
pub const API_KEY_HEADER: &str = "X-API-KEY";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Status the exchange returns for an expired or revoked API key.
pub const CREDENTIAL_EXPIRED_STATUS: StatusCode = StatusCode::UNAUTHORIZED;

const CLIENT_NAME: &str = "exchange";

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct ExchangeClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    signer: Arc<RequestSigner>,
}

impl ExchangeClient {
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        signer: Arc<RequestSigner>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("MMSIM/0.1.0 (market-making-simulator)")
            .build()
            .context("Failed to build HTTP client for exchange")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            signer,
        })
    }

    /// Sign `params` fresh and send them as a form body.
    async fn send_signed<K, V>(
        &self,
        method: Method,
        path: &str,
        params: Vec<(K, Option<V>)>,
    ) -> Result<Response, ExchangeError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let body = self.signer.build_signed_payload(params);
        let url = format!("{}{}", self.base_url, path);

        debug!(method = %method, url = %url, "Sending signed request");

        let resp = self
            .http
            .request(method, &url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        Ok(resp)
    }
}

#[async_trait]
impl Exchange for ExchangeClient {
    async fn cancel_all_open_orders(&self, pair: &PairConfig) -> Result<bool, ExchangeError> {
        let symbol = backend_symbol(&pair.symbol);
        let resp = self
            .send_signed(Method::DELETE, CANCEL_ALL_PATH, vec![("symbol", Some(symbol))])
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(true);
        }

        let body = resp.text().await.unwrap_or_default();
        warn!(
            pair = %pair.symbol,
            status = status.as_u16(),
            body = %body,
            "Cancel open orders skipped"
        );
        Ok(false)
    }

    async fn place_order(&self, order: &OrderIntent) -> Result<(), ExchangeError> {
        let resp = self
            .send_signed(Method::POST, ORDER_PATH, order.params())
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        if status == CREDENTIAL_EXPIRED_STATUS {
            return Err(ExchangeError::CredentialExpired {
                status: status.as_u16(),
                body,
            });
        }

        Err(ExchangeError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    fn name(&self) -> &str {
        CLIENT_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
