//! Per-pair trading cycle.
//!
//! One cycle runs strictly in order:
//! 1. fetch the mark price and plan the ladder at the pair's precision
//!    (failure aborts the cycle before anything is sent)
//! 2. cancel all open orders (best-effort, never aborts)
//! 3. place the ladder: every bid level, then every ask level
//! 4. place a BUY and a SELL at the exact mark price (self-cross)
//!
//! A failure in steps 1, 3 or 4 bumps the pair's consecutive-error count
//! and alerts. Reaching `max_errors` stops the process, as does an expired
//! credential on any placement. A fully successful cycle resets the count.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use super::ladder::{build_ladder, check_quotes};
use crate::alerts::AlertSink;
use crate::exchange::{build_order, Exchange};
use crate::oracle::PriceSource;
use crate::types::{
    CycleError, CycleStep, FatalStop, OrderType, PairConfig, PairRuntimeState, PairStatus, Side,
    TimeInForce,
};

/// Settings shared by every pair's engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSettings {
    /// Ladder depth per side.
    pub levels: u32,
    /// Consecutive failed cycles that stop the process.
    pub max_errors: u32,
}

/// Result of a cycle that did not stop the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Succeeded { orders_placed: usize, mark_price: Decimal },
    Degraded { consecutive_errors: u32 },
}

/// Cycle engine for one pair. Owns that pair's runtime state.
pub struct PairEngine {
    pair: PairConfig,
    settings: CycleSettings,
    state: PairRuntimeState,
    exchange: Arc<dyn Exchange>,
    prices: Arc<dyn PriceSource>,
    alerts: Arc<dyn AlertSink>,
}

impl PairEngine {
    pub fn new(
        pair: PairConfig,
        settings: CycleSettings,
        exchange: Arc<dyn Exchange>,
        prices: Arc<dyn PriceSource>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            pair,
            settings,
            state: PairRuntimeState::new(),
            exchange,
            prices,
            alerts,
        }
    }

    pub fn pair(&self) -> &PairConfig {
        &self.pair
    }

    pub fn state(&self) -> &PairRuntimeState {
        &self.state
    }

    /// Run one full cycle and apply the failure policy.
    ///
    /// Returns `Err` only for conditions that must stop every pair.
    pub async fn run_cycle(&mut self, cycle: u64) -> Result<CycleOutcome, FatalStop> {
        self.state.status = PairStatus::Running;
        let symbol = self.pair.symbol.clone();
        info!(pair = %symbol, cycle, "Starting pair cycle");

        match self.execute(cycle).await {
            Ok((orders_placed, mark_price)) => {
                let streak = self.state.record_success();
                info!(pair = %symbol, cycle, orders = orders_placed, "Pair cycle complete");
                if streak > 0 {
                    self.alerts
                        .notify(&format!(
                            "✅ [cycle {cycle}] {symbol} recovered after {streak} failed cycle(s)"
                        ))
                        .await;
                }
                Ok(CycleOutcome::Succeeded {
                    orders_placed,
                    mark_price,
                })
            }
            Err(CycleError::Exchange { step, source }) if source.is_credential_expired() => {
                self.state.status = PairStatus::Fatal;
                error!(pair = %symbol, cycle, %step, error = %source, "Credential expired, stopping");
                self.alerts
                    .notify(&format!(
                        "🛑 [cycle {cycle}] {symbol}: {source}. Stopping all pairs; renew the API key before restarting."
                    ))
                    .await;
                Err(FatalStop::CredentialExpired { symbol })
            }
            Err(e) => {
                let errors = self.state.record_failure();
                let max = self.settings.max_errors;
                warn!(
                    pair = %symbol,
                    cycle,
                    errors,
                    max_errors = max,
                    status = %self.state.status,
                    error = %e,
                    "Pair cycle failed"
                );
                self.alerts
                    .notify(&format!(
                        "⚠️ [cycle {cycle}] {symbol} failed ({errors}/{max}): {e}"
                    ))
                    .await;

                if errors >= max {
                    self.state.status = PairStatus::Fatal;
                    error!(pair = %symbol, cycle, errors, "Consecutive error threshold reached");
                    self.alerts
                        .notify(&format!(
                            "🛑 [cycle {cycle}] {symbol} hit {errors} consecutive failures. Stopping all pairs."
                        ))
                        .await;
                    return Err(FatalStop::ErrorThreshold { symbol, errors });
                }

                Ok(CycleOutcome::Degraded {
                    consecutive_errors: errors,
                })
            }
        }
    }

    /// Steps 1–4. Returns the number of orders placed and the mark price.
    async fn execute(&self, cycle: u64) -> Result<(usize, Decimal), CycleError> {
        let pair = &self.pair;

        // 1. Mark price
        let mark = self
            .prices
            .mark_price(pair)
            .await
            .map_err(|source| CycleError::Price {
                step: CycleStep::MarkPrice,
                source,
            })?;
        info!(pair = %pair.symbol, cycle, mark_price = %mark, "Mark price");

        let ladder = build_ladder(mark, pair, self.settings.levels)?;
        check_quotes(mark, &ladder, pair)?;

        // 2. Cancel (best-effort)
        match self.exchange.cancel_all_open_orders(pair).await {
            Ok(true) => info!(pair = %pair.symbol, cycle, "Cancelled open orders"),
            Ok(false) => {}
            Err(e) => warn!(pair = %pair.symbol, cycle, error = %e, "Cancel open orders skipped"),
        }

        // 3. Ladder: bids first, then asks
        let mut placed = 0;
        for side in [Side::Buy, Side::Sell] {
            for level in &ladder {
                let price = match side {
                    Side::Buy => level.bid_price,
                    Side::Sell => level.ask_price,
                };
                self.place(
                    CycleStep::Ladder {
                        side,
                        level: level.level,
                    },
                    side,
                    price,
                    Some(level.quantity),
                )
                .await?;
                placed += 1;
            }
        }

        // 4. Self-cross at the mark
        for side in [Side::Buy, Side::Sell] {
            self.place(CycleStep::SelfCross { side }, side, mark, None)
                .await?;
            placed += 1;
        }

        Ok((placed, mark))
    }

    async fn place(
        &self,
        step: CycleStep,
        side: Side,
        price: Decimal,
        quantity: Option<Decimal>,
    ) -> Result<(), CycleError> {
        let order = build_order(
            &self.pair,
            side,
            OrderType::Limit,
            Some(TimeInForce::Gtc),
            Some(price),
            quantity,
        );
        debug!(pair = %self.pair.symbol, %step, order = %order, "Placing order");

        self.exchange
            .place_order(&order)
            .await
            .map_err(|source| CycleError::Exchange { step, source })?;

        info!(
            pair = %self.pair.symbol,
            %step,
            price = order.price.as_deref().unwrap_or_default(),
            quantity = %order.quantity,
            "Order placed"
        );
        Ok(())
    }
}
