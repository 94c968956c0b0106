//! Per-pair cycle engine behaviour.

use rust_decimal_macros::dec;

use mmsim::engine::CycleOutcome;
use mmsim::types::*;

use crate::mocks::*;

#[tokio::test]
async fn test_successful_cycle_order_sequence() {
    let h = Harness::new();
    h.prices.set("BTC-USDC", PriceReply::Price(dec!(50000)));
    let mut engine = h.engine(btc_pair(), 3, 5);

    let outcome = engine.run_cycle(1).await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Succeeded {
            orders_placed: 8,
            mark_price: dec!(50000)
        }
    );

    let calls = h.exchange.calls();
    assert_eq!(calls.len(), 9);
    assert_eq!(calls[0], Call::Cancel { symbol: "BTCUSDCPERP".into() });

    let orders = h.exchange.orders_for("BTCUSDCPERP");
    let summary: Vec<(Side, &str, &str)> = orders
        .iter()
        .map(|o| (o.side, o.price.as_deref().unwrap(), o.quantity.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (Side::Buy, "49950.00", "0.0100"),
            (Side::Buy, "49900.00", "0.0150"),
            (Side::Buy, "49850.00", "0.0200"),
            (Side::Sell, "50050.00", "0.0100"),
            (Side::Sell, "50100.00", "0.0150"),
            (Side::Sell, "50150.00", "0.0200"),
            (Side::Buy, "50000.00", "0.0100"),
            (Side::Sell, "50000.00", "0.0100"),
        ]
    );
    assert!(orders.iter().all(|o| o.order_type == OrderType::Limit
        && o.time_in_force == Some(TimeInForce::Gtc)
        && o.product_id == 1));

    assert_eq!(engine.state().consecutive_errors, 0);
    assert_eq!(engine.state().status, PairStatus::Succeeded);
    assert!(h.alerts.messages().is_empty());
}

#[tokio::test]
async fn test_zero_price_places_nothing() {
    let h = Harness::new();
    h.prices.set("BTC-USDC", PriceReply::Zero);
    let mut engine = h.engine(btc_pair(), 3, 5);

    let outcome = engine.run_cycle(1).await.unwrap();

    assert_eq!(outcome, CycleOutcome::Degraded { consecutive_errors: 1 });
    assert!(h.exchange.calls().is_empty());
    assert_eq!(engine.state().consecutive_errors, 1);
    assert_eq!(engine.state().status, PairStatus::Degraded);

    let alerts = h.alerts.messages();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("[cycle 1]"));
    assert!(alerts[0].contains("BTC-USDC"));
    assert!(alerts[0].contains("(1/5)"));
}

#[tokio::test]
async fn test_unavailable_price_places_nothing() {
    let h = Harness::new();
    let mut engine = h.engine(btc_pair(), 2, 5);

    engine.run_cycle(4).await.unwrap();

    assert!(h.exchange.calls().is_empty());
    assert_eq!(engine.state().consecutive_errors, 1);
}

#[tokio::test]
async fn test_cancel_failure_does_not_block_placement() {
    let h = Harness::new();
    h.prices.set("BTC-USDC", PriceReply::Price(dec!(100)));
    h.exchange.set_cancel_fails(true);
    let mut engine = h.engine(btc_pair(), 2, 5);

    let outcome = engine.run_cycle(1).await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Succeeded { orders_placed: 6, .. }));
    assert_eq!(engine.state().consecutive_errors, 0);
}

#[tokio::test]
async fn test_rejection_aborts_rest_of_cycle() {
    let h = Harness::new();
    h.prices.set("BTC-USDC", PriceReply::Price(dec!(50000)));
    // Bid L1 succeeds, bid L2 is rejected.
    h.exchange.fail_after("BTCUSDCPERP", 1, Failure::Rejected);
    let mut engine = h.engine(btc_pair(), 3, 5);

    let outcome = engine.run_cycle(1).await.unwrap();

    assert_eq!(outcome, CycleOutcome::Degraded { consecutive_errors: 1 });
    let orders = h.exchange.orders_for("BTCUSDCPERP");
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[1].side, Side::Buy);
    assert_eq!(orders[1].price.as_deref(), Some("49900.00"));

    let alerts = h.alerts.messages();
    assert!(alerts[0].contains("ladder BUY L2"));
    assert!(alerts[0].contains("HTTP 400"));
}

#[tokio::test]
async fn test_self_cross_failure_counts_as_cycle_failure() {
    let h = Harness::new();
    h.prices.set("BTC-USDC", PriceReply::Price(dec!(50000)));
    // 2 levels × 2 sides = 4 ladder orders, then the self-cross BUY fails.
    h.exchange.fail_after("BTCUSDCPERP", 4, Failure::Rejected);
    let mut engine = h.engine(btc_pair(), 2, 5);

    engine.run_cycle(1).await.unwrap();

    assert_eq!(engine.state().consecutive_errors, 1);
    assert_eq!(h.exchange.orders_for("BTCUSDCPERP").len(), 5);
    assert!(h.alerts.messages()[0].contains("self-cross BUY"));
}

#[tokio::test]
async fn test_threshold_stops_with_exit_one() {
    let h = Harness::new();
    h.prices.set("BTC-USDC", PriceReply::Zero);
    let mut engine = h.engine(btc_pair(), 2, 3);

    assert!(engine.run_cycle(1).await.is_ok());
    assert!(engine.run_cycle(2).await.is_ok());
    let stop = engine.run_cycle(3).await.unwrap_err();

    assert_eq!(
        stop,
        FatalStop::ErrorThreshold {
            symbol: "BTC-USDC".into(),
            errors: 3
        }
    );
    assert_eq!(stop.exit_code(), 1);
    assert_eq!(engine.state().status, PairStatus::Fatal);

    let alerts = h.alerts.messages();
    // Three warnings plus the fatal alert.
    assert_eq!(alerts.len(), 4);
    assert!(alerts[3].contains("3 consecutive failures"));
}

#[tokio::test]
async fn test_success_resets_counter() {
    let h = Harness::new();
    h.prices.set("BTC-USDC", PriceReply::Zero);
    let mut engine = h.engine(btc_pair(), 1, 3);

    engine.run_cycle(1).await.unwrap();
    engine.run_cycle(2).await.unwrap();
    assert_eq!(engine.state().consecutive_errors, 2);

    h.prices.set("BTC-USDC", PriceReply::Price(dec!(10)));
    engine.run_cycle(3).await.unwrap();
    assert_eq!(engine.state().consecutive_errors, 0);
    assert!(h.alerts.messages().last().unwrap().contains("recovered after 2"));

    // Two more failures stay below the threshold of 3.
    h.prices.set("BTC-USDC", PriceReply::Zero);
    assert!(engine.run_cycle(4).await.is_ok());
    assert!(engine.run_cycle(5).await.is_ok());
    assert_eq!(engine.state().consecutive_errors, 2);
}

#[tokio::test]
async fn test_credential_expiry_is_fatal_and_not_retried() {
    let h = Harness::new();
    h.prices.set("BTC-USDC", PriceReply::Price(dec!(50000)));
    h.exchange.fail_after("BTCUSDCPERP", 0, Failure::CredentialExpired);
    let mut engine = h.engine(btc_pair(), 3, 5);

    let stop = engine.run_cycle(1).await.unwrap_err();

    assert_eq!(stop, FatalStop::CredentialExpired { symbol: "BTC-USDC".into() });
    assert_eq!(stop.exit_code(), 0);
    assert_eq!(h.exchange.orders_for("BTCUSDCPERP").len(), 1);
    assert_eq!(engine.state().consecutive_errors, 0);
    assert_eq!(engine.state().status, PairStatus::Fatal);
    assert!(h.alerts.messages()[0].contains("Credential expired"));
}

#[tokio::test]
async fn test_spot_pair_uses_unsuffixed_symbol() {
    let h = Harness::new();
    let pair = PairConfig::new("SOL/USDC", 5, dec!(0.01), dec!(2));
    h.prices.set("SOL/USDC", PriceReply::Price(dec!(150)));
    let mut engine = h.engine(pair, 1, 5);

    engine.run_cycle(1).await.unwrap();

    let orders = h.exchange.orders_for("SOLUSDC");
    assert_eq!(orders.len(), 4);
    assert_eq!(orders[0].price.as_deref(), Some("148.50"));
    assert_eq!(orders[1].price.as_deref(), Some("151.50"));
}

#[tokio::test]
async fn test_sub_tick_mark_sends_nothing() {
    let h = Harness::new();
    let pair = PairConfig::new("PEPE-USDC", 9, dec!(0.001), dec!(1000));
    h.prices.set("PEPE-USDC", PriceReply::Price(dec!(0.004)));
    let mut engine = h.engine(pair, 1, 5);

    let outcome = engine.run_cycle(1).await.unwrap();

    assert_eq!(outcome, CycleOutcome::Degraded { consecutive_errors: 1 });
    assert!(h.exchange.calls().is_empty());
    let alerts = h.alerts.messages();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("ladder BUY L1"));
    assert!(alerts[0].contains("rounds to"));
}

#[tokio::test]
async fn test_sub_lot_quantity_sends_nothing() {
    let h = Harness::new();
    let pair = PairConfig::new("BTC-USDC", 1, dec!(0.001), dec!(0.00004));
    h.prices.set("BTC-USDC", PriceReply::Price(dec!(50000)));
    let mut engine = h.engine(pair, 1, 5);

    let outcome = engine.run_cycle(1).await.unwrap();

    assert_eq!(outcome, CycleOutcome::Degraded { consecutive_errors: 1 });
    assert!(h.exchange.calls().is_empty());
}

#[tokio::test]
async fn test_level_rounding_onto_mark_sends_nothing() {
    let h = Harness::new();
    let pair = PairConfig::new("DEMO-USDC", 3, dec!(0.005), dec!(1));
    h.prices.set("DEMO-USDC", PriceReply::Price(dec!(1.0)));
    let mut engine = h.engine(pair, 2, 5);

    let outcome = engine.run_cycle(1).await.unwrap();

    assert_eq!(outcome, CycleOutcome::Degraded { consecutive_errors: 1 });
    assert!(h.exchange.calls().is_empty());
}

#[tokio::test]
async fn test_oversized_mark_is_a_cycle_error() {
    let h = Harness::new();
    h.prices.set(
        "BTC-USDC",
        PriceReply::Price(rust_decimal::Decimal::MAX - dec!(1000)),
    );
    let mut engine = h.engine(btc_pair(), 3, 5);

    let outcome = engine.run_cycle(1).await.unwrap();

    assert_eq!(outcome, CycleOutcome::Degraded { consecutive_errors: 1 });
    assert!(h.exchange.calls().is_empty());
    assert!(h.alerts.messages()[0].contains("overflows"));
}

#[tokio::test]
async fn test_stalled_alert_endpoint_does_not_hold_the_cycle() {
    use std::sync::Arc;
    use std::time::Duration;

    use mmsim::alerts::{AlertSink, BackgroundAlerts};
    use mmsim::engine::{CycleSettings, PairEngine};

    let h = Harness::new();
    let gated = Arc::new(GatedAlerts::new());
    let alerts = Arc::new(BackgroundAlerts::new(gated.clone()));
    let mut engine = PairEngine::new(
        btc_pair(),
        CycleSettings { levels: 1, max_errors: 5 },
        h.exchange.clone(),
        h.prices.clone(),
        alerts.clone(),
    );

    // No price configured: the cycle fails and raises a warning alert.
    let outcome = tokio::time::timeout(Duration::from_secs(1), engine.run_cycle(1))
        .await
        .expect("cycle waited on alert delivery")
        .unwrap();
    assert_eq!(outcome, CycleOutcome::Degraded { consecutive_errors: 1 });
    assert!(gated.messages().is_empty());

    gated.open();
    alerts.flush().await;
    assert_eq!(gated.messages().len(), 1);
}
