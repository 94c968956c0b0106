//! Shared types for the MMSIM simulator.
//!
//! These types form the data model used across all modules.
//! Pair configuration and order intents are plain values; the only
//! mutable cross-cycle state is [`PairRuntimeState`], owned by each
//! pair's cycle engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Pair configuration
// ---------------------------------------------------------------------------

/// Where a pair's mark price comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSourceKind {
    /// External reference venue, queried with the derived external symbol.
    #[default]
    External,
    /// The exchange-under-test's own mark-price endpoint.
    Exchange,
}

/// One configured trading pair. Immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairConfig {
    /// Display symbol, e.g. `BTC-USDC` (perpetual) or `BTC/USDC` (spot).
    pub symbol: String,
    pub product_id: u64,
    /// Fractional per-level price offset.
    pub spread: Decimal,
    /// Base order size in base units.
    pub quantity: Decimal,
    #[serde(default)]
    pub price_source: PriceSourceKind,
    /// Nominal price used when no oracle yields a usable value.
    #[serde(default)]
    pub fallback_price: Option<Decimal>,
    #[serde(default = "default_price_decimals")]
    pub price_decimals: u32,
    #[serde(default = "default_quantity_decimals")]
    pub quantity_decimals: u32,
}

fn default_price_decimals() -> u32 {
    2
}

fn default_quantity_decimals() -> u32 {
    4
}

impl PairConfig {
    /// Pair with default precision and the external price source.
    pub fn new(symbol: &str, product_id: u64, spread: Decimal, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            product_id,
            spread,
            quantity,
            price_source: PriceSourceKind::External,
            fallback_price: None,
            price_decimals: default_price_decimals(),
            quantity_decimals: default_quantity_decimals(),
        }
    }
}

impl fmt::Display for PairConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (product {} | spread {} | qty {})",
            self.symbol, self.product_id, self.spread, self.quantity
        )
    }
}

// ---------------------------------------------------------------------------
// Order enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderType {
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "LIMIT",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order time-in-force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeInForce {
    /// Good-till-cancelled.
    Gtc,
    /// Add-liquidity-only (post-only).
    Alo,
    /// Immediate-or-cancel.
    Ioc,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Alo => "ALO",
            TimeInForce::Ioc => "IOC",
        }
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Order intent
// ---------------------------------------------------------------------------

/// A single order, built and submitted once. Fills are never reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIntent {
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: Option<TimeInForce>,
    /// Already rounded to the pair's price precision.
    pub price: Option<String>,
    pub quantity: String,
    /// Backend-format symbol.
    pub symbol: String,
    pub product_id: u64,
}

impl OrderIntent {
    /// Form fields for the order body, without `timestamp`/`signature`.
    /// Unset optional fields are carried as `None` and dropped at signing.
    pub fn params(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("productId", Some(self.product_id.to_string())),
            ("symbol", Some(self.symbol.clone())),
            ("side", Some(self.side.as_str().to_string())),
            ("type", Some(self.order_type.as_str().to_string())),
            ("quantity", Some(self.quantity.clone())),
            (
                "timeInForce",
                self.time_in_force.map(|t| t.as_str().to_string()),
            ),
            ("price", self.price.clone()),
        ]
    }
}

impl fmt::Display for OrderIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} @ {}",
            self.side,
            self.quantity,
            self.symbol,
            self.price.as_deref().unwrap_or("MKT")
        )?;
        if let Some(tif) = self.time_in_force {
            write!(f, " {tif}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Per-pair runtime state
// ---------------------------------------------------------------------------

/// Cycle-engine state for one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairStatus {
    #[default]
    Idle,
    Running,
    Succeeded,
    Degraded,
    Fatal,
}

impl fmt::Display for PairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairStatus::Idle => write!(f, "idle"),
            PairStatus::Running => write!(f, "running"),
            PairStatus::Succeeded => write!(f, "succeeded"),
            PairStatus::Degraded => write!(f, "degraded"),
            PairStatus::Fatal => write!(f, "fatal"),
        }
    }
}

/// Mutable state for one pair, touched only by that pair's engine.
#[derive(Debug, Clone, Default)]
pub struct PairRuntimeState {
    pub consecutive_errors: u32,
    pub status: PairStatus,
    pub cycles_succeeded: u64,
    pub cycles_failed: u64,
}

impl PairRuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fully successful cycle. Returns the error streak it ended.
    pub fn record_success(&mut self) -> u32 {
        let streak = self.consecutive_errors;
        self.consecutive_errors = 0;
        self.cycles_succeeded += 1;
        self.status = PairStatus::Succeeded;
        streak
    }

    /// Record a failed cycle. Returns the new consecutive error count.
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_errors += 1;
        self.cycles_failed += 1;
        self.status = PairStatus::Degraded;
        self.consecutive_errors
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Mark-price lookup failures.
#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    #[error("No mark price available for {symbol}: {reason}")]
    Unavailable { symbol: String, reason: String },

    #[error("Invalid mark price for {symbol}: {raw}")]
    Invalid { symbol: String, raw: String },
}

/// Exchange API failures.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("Credential expired (HTTP {status}): {body}")]
    CredentialExpired { status: u16, body: String },

    #[error("Order rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Exchange request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ExchangeError {
    pub fn is_credential_expired(&self) -> bool {
        matches!(self, ExchangeError::CredentialExpired { .. })
    }
}

/// Step of a cycle that failed, for alert context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStep {
    MarkPrice,
    Ladder { side: Side, level: u32 },
    SelfCross { side: Side },
}

impl fmt::Display for CycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleStep::MarkPrice => write!(f, "mark price"),
            CycleStep::Ladder { side, level } => write!(f, "ladder {side} L{level}"),
            CycleStep::SelfCross { side } => write!(f, "self-cross {side}"),
        }
    }
}

/// Order set that cannot be quoted at the pair's precision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuoteError {
    #[error("ladder L{level} overflows around mark {mark}")]
    Overflow { level: u32, mark: Decimal },

    #[error("{field} {value} rounds to {rounded} at {decimals} decimals")]
    RoundsToZero {
        field: &'static str,
        value: Decimal,
        rounded: Decimal,
        decimals: u32,
    },

    #[error("{side} price {price} does not clear {bound} at {decimals} decimals")]
    NotSeparated {
        side: Side,
        price: Decimal,
        bound: Decimal,
        decimals: u32,
    },
}

/// A recoverable, cycle-level failure for one pair.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("{step} failed: {source}")]
    Price {
        step: CycleStep,
        #[source]
        source: PriceError,
    },

    #[error("{step} failed: {source}")]
    Quote {
        step: CycleStep,
        #[source]
        source: QuoteError,
    },

    #[error("{step} failed: {source}")]
    Exchange {
        step: CycleStep,
        #[source]
        source: ExchangeError,
    },
}

/// Conditions that stop the whole process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FatalStop {
    #[error("API credential expired while trading {symbol}")]
    CredentialExpired { symbol: String },

    #[error("{symbol} reached {errors} consecutive failed cycles")]
    ErrorThreshold { symbol: String, errors: u32 },
}

impl FatalStop {
    /// Process exit status. Credential expiry must not be auto-restarted
    /// by a supervisor, so it exits 0; the error threshold exits 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            FatalStop::CredentialExpired { .. } => 0,
            FatalStop::ErrorThreshold { .. } => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
