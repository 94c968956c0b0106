//! Mark-price oracle.
//!
//! Defines the `PriceSource` trait consumed by the cycle engine and the
//! HTTP-backed `MarkPriceOracle`, which picks a source per pair:
//!
//! - `external` (default): the reference venue's mark-price endpoint,
//!   queried with a derived external symbol (`BTC-USDC` → `BTCUSDT`).
//! - `exchange`: the exchange-under-test's own mark-price endpoint, then
//!   the pair's static `fallbackPrice` if that yields nothing.
//!
//! A zero, negative or non-numeric price is always an error.

pub mod mark_price;

use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::types::{PairConfig, PriceError};

pub use mark_price::MarkPriceOracle;

/// Quote currencies the reference venue lists under another name.
const QUOTE_ALIASES: &[(&str, &str)] = &[("USDC", "USDT")];

/// Price fields accepted in oracle responses, in priority order.
const PRICE_FIELDS: &[&str] = &["markPrice", "price"];

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Current mark price for the pair. Always strictly positive.
    async fn mark_price(&self, pair: &PairConfig) -> Result<Decimal, PriceError>;
}

/// Derive the reference-venue symbol from a display symbol.
pub fn external_symbol(display: &str) -> String {
    let display = display.trim().to_uppercase();
    match display.split_once(|c: char| c == '-' || c == '/') {
        Some((base, quote)) => {
            let quote = QUOTE_ALIASES
                .iter()
                .find(|(from, _)| *from == quote)
                .map(|(_, to)| *to)
                .unwrap_or(quote);
            format!("{base}{quote}")
        }
        None => display,
    }
}

/// Pull the raw price out of an oracle response.
///
/// Accepts an object or an array whose first element is an object, with
/// the price under `markPrice` or `price` as a number or a string.
pub fn extract_price(body: &Value) -> Option<String> {
    let obj = match body {
        Value::Array(items) => items.first()?,
        other => other,
    };
    PRICE_FIELDS.iter().find_map(|field| match obj.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Parse a raw price, rejecting anything that is not a positive number.
pub fn parse_price(symbol: &str, raw: &str) -> Result<Decimal, PriceError> {
    let trimmed = raw.trim();
    let price = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| PriceError::Invalid {
            symbol: symbol.to_string(),
            raw: raw.to_string(),
        })?;

    if price <= Decimal::ZERO {
        return Err(PriceError::Invalid {
            symbol: symbol.to_string(),
            raw: raw.to_string(),
        });
    }
    Ok(price)
}
