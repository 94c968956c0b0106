//! Configuration loading.
//!
//! Two sources produce the same immutable `AppConfig`:
//! - a TOML file (`MMSIM_CONFIG=path`), where secrets are referenced by
//!   env-var name and resolved at load time
//! - plain environment keys (`BACKEND_URL`, `API_KEY`, `SIGNING_SEED`,
//!   `PAIRS` or the single-pair `SYMBOL`/`PRODUCT_ID`/`SPREAD`/`QUANTITY`,
//!   `LEVELS`, `INTERVAL_MS`, `MAX_ERRORS`, ...)
//!
//! Secrets are wrapped in `SecretString` so they never reach the logs.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

use crate::oracle::mark_price::DEFAULT_REFERENCE_URL;
use crate::engine::ladder::round_to;
use crate::types::PairConfig;

const DEFAULT_LEVELS: u32 = 5;
const DEFAULT_INTERVAL_MS: u64 = 10_000;
const DEFAULT_MAX_ERRORS: u32 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub exchange: ExchangeConfig,
    pub market_maker: MarketMakerConfig,
    pub pairs: Vec<PairConfig>,
    pub alerts: AlertsConfig,
}

#[derive(Debug)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub api_key: SecretString,
    /// Hex-encoded 32-byte Ed25519 seed.
    pub signing_seed: SecretString,
    pub reference_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct MarketMakerConfig {
    #[serde(default = "default_levels")]
    pub levels: u32,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_max_errors")]
    pub max_errors: u32,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Default)]
pub struct AlertsConfig {
    pub telegram_bot_token: Option<SecretString>,
    pub telegram_chat_id: Option<String>,
}

fn default_levels() -> u32 {
    DEFAULT_LEVELS
}

fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL_MS
}

fn default_max_errors() -> u32 {
    DEFAULT_MAX_ERRORS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_reference_url() -> String {
    DEFAULT_REFERENCE_URL.to_string()
}

impl Default for MarketMakerConfig {
    fn default() -> Self {
        Self {
            levels: DEFAULT_LEVELS,
            interval_ms: DEFAULT_INTERVAL_MS,
            max_errors: DEFAULT_MAX_ERRORS,
            dry_run: false,
        }
    }
}

// ---------------------------------------------------------------------------
// TOML file shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FileConfig {
    exchange: FileExchangeConfig,
    #[serde(default)]
    market_maker: MarketMakerConfig,
    pairs: Vec<PairConfig>,
    #[serde(default)]
    alerts: FileAlertsConfig,
}

#[derive(Debug, Deserialize)]
struct FileExchangeConfig {
    base_url: String,
    api_key_env: String,
    signing_seed_env: String,
    #[serde(default = "default_reference_url")]
    reference_url: String,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
struct FileAlertsConfig {
    telegram_bot_token_env: Option<String>,
    telegram_chat_id_env: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a TOML file, resolving secrets from the
    /// process environment.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents, |name| std::env::var(name).ok())
            .with_context(|| format!("Failed to load config file: {path}"))
    }

    /// Load configuration from plain environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Parse TOML contents, resolving `*_env` references with `lookup`.
    pub fn from_toml_str<F>(contents: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: FileConfig = toml::from_str(contents).context("Failed to parse TOML")?;
        let resolve = |name: &str| -> Result<String> {
            lookup(name).with_context(|| format!("Environment variable not set: {name}"))
        };

        let alerts = AlertsConfig {
            telegram_bot_token: file
                .alerts
                .telegram_bot_token_env
                .as_deref()
                .and_then(|name| lookup(name))
                .map(SecretString::new),
            telegram_chat_id: file
                .alerts
                .telegram_chat_id_env
                .as_deref()
                .and_then(|name| lookup(name)),
        };

        let config = Self {
            exchange: ExchangeConfig {
                base_url: file.exchange.base_url,
                api_key: SecretString::new(resolve(&file.exchange.api_key_env)?),
                signing_seed: SecretString::new(resolve(&file.exchange.signing_seed_env)?),
                reference_url: file.exchange.reference_url,
                request_timeout_secs: file.exchange.request_timeout_secs,
            },
            market_maker: file.market_maker,
            pairs: file.pairs,
            alerts,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from environment-style keys supplied by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> Result<String> {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("Environment variable not set: {name}"))
        };

        let pairs = match lookup("PAIRS").filter(|v| !v.trim().is_empty()) {
            Some(json) => serde_json::from_str::<Vec<PairConfig>>(&json)
                .context("PAIRS must be a JSON array of pair objects")?,
            None => vec![PairConfig::new(
                &required("SYMBOL")?,
                parse_value("PRODUCT_ID", &required("PRODUCT_ID")?)?,
                parse_value::<Decimal>("SPREAD", &required("SPREAD")?)?,
                parse_value::<Decimal>("QUANTITY", &required("QUANTITY")?)?,
            )],
        };

        let config = Self {
            exchange: ExchangeConfig {
                base_url: required("BACKEND_URL")?,
                api_key: SecretString::new(required("API_KEY")?),
                signing_seed: SecretString::new(required("SIGNING_SEED")?),
                reference_url: lookup("REFERENCE_URL").unwrap_or_else(default_reference_url),
                request_timeout_secs: optional(&lookup, "REQUEST_TIMEOUT_SECS")?
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            },
            market_maker: MarketMakerConfig {
                levels: optional(&lookup, "LEVELS")?.unwrap_or(DEFAULT_LEVELS),
                interval_ms: optional(&lookup, "INTERVAL_MS")?.unwrap_or(DEFAULT_INTERVAL_MS),
                max_errors: optional(&lookup, "MAX_ERRORS")?.unwrap_or(DEFAULT_MAX_ERRORS),
                dry_run: optional(&lookup, "DRY_RUN")?.unwrap_or(false),
            },
            pairs,
            alerts: AlertsConfig {
                telegram_bot_token: lookup("TELEGRAM_BOT_TOKEN")
                    .filter(|v| !v.is_empty())
                    .map(SecretString::new),
                telegram_chat_id: lookup("TELEGRAM_CHAT_ID").filter(|v| !v.is_empty()),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let mm = &self.market_maker;
        if self.exchange.base_url.trim().is_empty() {
            bail!("Backend URL must not be empty");
        }
        if self.pairs.is_empty() {
            bail!("At least one trading pair must be configured");
        }
        if mm.levels == 0 {
            bail!("LEVELS must be at least 1");
        }
        if mm.interval_ms == 0 {
            bail!("INTERVAL_MS must be positive");
        }
        if mm.max_errors == 0 {
            bail!("MAX_ERRORS must be at least 1");
        }

        let mut seen = HashSet::new();
        for pair in &self.pairs {
            if !seen.insert(pair.symbol.to_uppercase()) {
                bail!("Duplicate pair symbol: {}", pair.symbol);
            }
            if !pair.symbol.contains('-') && !pair.symbol.contains('/') {
                bail!(
                    "Pair symbol {} must separate base and quote with '-' (perpetual) or '/' (spot)",
                    pair.symbol
                );
            }
            if pair.spread <= Decimal::ZERO {
                bail!("Spread for {} must be positive", pair.symbol);
            }
            if pair.quantity <= Decimal::ZERO {
                bail!("Quantity for {} must be positive", pair.symbol);
            }
            if round_to(pair.quantity, pair.quantity_decimals) <= Decimal::ZERO {
                bail!(
                    "Quantity {} for {} rounds to zero at {} decimals",
                    pair.quantity,
                    pair.symbol,
                    pair.quantity_decimals
                );
            }
            let depth = pair.spread.checked_mul(Decimal::from(mm.levels));
            if depth.map_or(true, |d| d >= Decimal::ONE) {
                bail!(
                    "Spread {} × {} levels for {} would quote a non-positive bid",
                    pair.spread,
                    mm.levels,
                    pair.symbol
                );
            }
            if let Some(fallback) = pair.fallback_price {
                if fallback <= Decimal::ZERO {
                    bail!("Fallback price for {} must be positive", pair.symbol);
                }
            }
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.market_maker.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.exchange.request_timeout_secs)
    }
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid value for {name}: {raw} ({e})"))
}

fn optional<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).filter(|v| !v.trim().is_empty()) {
        Some(raw) => parse_value(name, &raw).map(Some),
        None => Ok(None),
    }
}
