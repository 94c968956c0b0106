//! Exchange integration.
//!
//! Defines the `Exchange` trait used by the cycle engine and provides:
//! - `ExchangeClient` — signed HTTP client for the exchange-under-test
//! - `DryRunExchange` — logs intents without touching the network
//!
//! Also owns display → backend symbol translation.

pub mod client;
pub mod dry_run;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::engine::ladder::format_decimal;
use crate::types::{ExchangeError, OrderIntent, OrderType, PairConfig, Side, TimeInForce};

/// Suffix marking a hyphenated display pair as a perpetual instrument.
pub const PERP_SUFFIX: &str = "PERP";

/// Abstraction over the exchange-under-test.
///
/// All calls are signed. Implementors must not cache signed payloads.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Cancel every open order for the pair.
    ///
    /// Returns `Ok(false)` when the exchange answered with a non-2xx status;
    /// callers treat that as skipped and carry on.
    async fn cancel_all_open_orders(&self, pair: &PairConfig) -> Result<bool, ExchangeError>;

    /// Submit one order.
    async fn place_order(&self, order: &OrderIntent) -> Result<(), ExchangeError>;

    /// Client name for logging.
    fn name(&self) -> &str;
}

/// Convert a display symbol to the backend's concatenated form.
///
/// `BTC-USDC` is a perpetual and becomes `BTCUSDCPERP`; `BTC/USDC` is spot
/// and becomes `BTCUSDC`.
pub fn backend_symbol(display: &str) -> String {
    let display = display.trim().to_uppercase();
    if display.contains('-') {
        format!("{}{PERP_SUFFIX}", display.replace('-', ""))
    } else {
        display.replace('/', "")
    }
}

/// Build an order intent for a pair. `quantity` defaults to the pair's
/// configured size.
pub fn build_order(
    pair: &PairConfig,
    side: Side,
    order_type: OrderType,
    time_in_force: Option<TimeInForce>,
    price: Option<Decimal>,
    quantity: Option<Decimal>,
) -> OrderIntent {
    let quantity = quantity.unwrap_or(pair.quantity);
    OrderIntent {
        side,
        order_type,
        time_in_force,
        price: price.map(|p| format_decimal(p, pair.price_decimals)),
        quantity: format_decimal(quantity, pair.quantity_decimals),
        symbol: backend_symbol(&pair.symbol),
        product_id: pair.product_id,
    }
}
