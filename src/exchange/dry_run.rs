//! Dry-run exchange.
//!
//! Signs every payload exactly as the real client would, logs it, and
//! reports success without sending anything.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{backend_symbol, Exchange};
use crate::signer::RequestSigner;
use crate::types::{ExchangeError, OrderIntent, PairConfig};

pub struct DryRunExchange {
    signer: Arc<RequestSigner>,
    orders: AtomicU64,
}

impl DryRunExchange {
    pub fn new(signer: Arc<RequestSigner>) -> Self {
        Self {
            signer,
            orders: AtomicU64::new(0),
        }
    }

    /// Orders "placed" so far.
    pub fn orders_placed(&self) -> u64 {
        self.orders.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Exchange for DryRunExchange {
    async fn cancel_all_open_orders(&self, pair: &PairConfig) -> Result<bool, ExchangeError> {
        let symbol = backend_symbol(&pair.symbol);
        let payload = self
            .signer
            .build_signed_payload(vec![("symbol", Some(symbol))]);
        info!(pair = %pair.symbol, payload_len = payload.len(), "[DRY RUN] Would cancel open orders");
        Ok(true)
    }

    async fn place_order(&self, order: &OrderIntent) -> Result<(), ExchangeError> {
        let payload = self.signer.build_signed_payload(order.params());
        self.orders.fetch_add(1, Ordering::Relaxed);
        info!(order = %order, payload_len = payload.len(), "[DRY RUN] Would place order");
        Ok(())
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}
