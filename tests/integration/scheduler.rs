//! Scheduler fan-out and process-level stop policy.

use rust_decimal_macros::dec;
use std::time::Duration;

use mmsim::engine::{Scheduler, ShutdownReason};
use mmsim::types::*;

use crate::mocks::*;

#[tokio::test]
async fn test_tick_isolates_pairs() {
    let h = Harness::new();
    h.prices.set("BTC-USDC", PriceReply::Zero);
    h.prices.set("ETH-USDC", PriceReply::Price(dec!(3000)));
    let mut scheduler = Scheduler::new(
        vec![h.engine(btc_pair(), 2, 5), h.engine(eth_pair(), 2, 5)],
        Duration::from_millis(10),
    );

    let report = scheduler.run_tick().await.unwrap();

    assert_eq!(report.cycle, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.degraded, 1);
    assert_eq!(report.orders_placed, 6);

    let engines = scheduler.engines();
    assert_eq!(engines[0].state().consecutive_errors, 1);
    assert_eq!(engines[1].state().consecutive_errors, 0);
    assert!(h.exchange.orders_for("BTCUSDCPERP").is_empty());
    assert_eq!(h.exchange.orders_for("ETHUSDCPERP").len(), 6);
}

#[tokio::test]
async fn test_pairs_run_concurrently_within_tick() {
    let h = Harness::new();
    h.prices.set("BTC-USDC", PriceReply::Price(dec!(50000)));
    h.prices.set("ETH-USDC", PriceReply::Price(dec!(3000)));
    let mut scheduler = Scheduler::new(
        vec![h.engine(btc_pair(), 3, 5), h.engine(eth_pair(), 3, 5)],
        Duration::from_millis(10),
    );

    scheduler.run_tick().await.unwrap();

    // Both pairs yield at every call, so their requests interleave.
    let symbols: Vec<String> = h
        .exchange
        .calls()
        .into_iter()
        .map(|c| match c {
            Call::Cancel { symbol } => symbol,
            Call::Place(o) => o.symbol,
        })
        .collect();
    let first_eth = symbols.iter().position(|s| s == "ETHUSDCPERP").unwrap();
    let last_btc = symbols.iter().rposition(|s| s == "BTCUSDCPERP").unwrap();
    assert!(first_eth < last_btc);
}

#[tokio::test]
async fn test_failing_pair_does_not_stop_healthy_pair_before_threshold() {
    let h = Harness::new();
    h.prices.set("BTC-USDC", PriceReply::Unavailable);
    h.prices.set("ETH-USDC", PriceReply::Price(dec!(3000)));
    let mut scheduler = Scheduler::new(
        vec![h.engine(btc_pair(), 1, 3), h.engine(eth_pair(), 1, 3)],
        Duration::from_millis(10),
    );

    scheduler.run_tick().await.unwrap();
    scheduler.run_tick().await.unwrap();

    assert_eq!(scheduler.engines()[0].state().consecutive_errors, 2);
    assert_eq!(scheduler.engines()[1].state().cycles_succeeded, 2);
    assert_eq!(h.exchange.orders_for("ETHUSDCPERP").len(), 8);
}

#[tokio::test]
async fn test_run_stops_on_error_threshold() {
    let h = Harness::new();
    h.prices.set("BTC-USDC", PriceReply::Zero);
    h.prices.set("ETH-USDC", PriceReply::Price(dec!(3000)));
    let mut scheduler = Scheduler::new(
        vec![h.engine(btc_pair(), 1, 2), h.engine(eth_pair(), 1, 2)],
        Duration::from_millis(5),
    );

    let reason = tokio::time::timeout(
        Duration::from_secs(5),
        scheduler.run(std::future::pending::<()>()),
    )
    .await
    .expect("scheduler should stop on its own");

    assert_eq!(
        reason,
        ShutdownReason::Fatal(FatalStop::ErrorThreshold {
            symbol: "BTC-USDC".into(),
            errors: 2
        })
    );
    assert_eq!(reason.exit_code(), 1);
    assert_eq!(scheduler.cycle(), 2);
}

#[tokio::test]
async fn test_run_stops_on_credential_expiry() {
    let h = Harness::new();
    h.prices.set("BTC-USDC", PriceReply::Price(dec!(50000)));
    h.exchange.fail_after("BTCUSDCPERP", 0, Failure::CredentialExpired);
    let mut scheduler = Scheduler::new(vec![h.engine(btc_pair(), 2, 5)], Duration::from_millis(5));

    let reason = tokio::time::timeout(
        Duration::from_secs(5),
        scheduler.run(std::future::pending::<()>()),
    )
    .await
    .expect("scheduler should stop on its own");

    assert!(matches!(
        reason,
        ShutdownReason::Fatal(FatalStop::CredentialExpired { .. })
    ));
    assert_eq!(reason.exit_code(), 0);
    assert_eq!(scheduler.cycle(), 1);
    assert_eq!(h.exchange.orders_for("BTCUSDCPERP").len(), 1);
}

#[tokio::test]
async fn test_signal_before_first_tick() {
    let h = Harness::new();
    h.prices.set("BTC-USDC", PriceReply::Price(dec!(50000)));
    let mut scheduler = Scheduler::new(vec![h.engine(btc_pair(), 2, 5)], Duration::from_millis(5));

    let reason = scheduler.run(std::future::ready(())).await;

    assert_eq!(reason, ShutdownReason::Signal);
    assert_eq!(reason.exit_code(), 0);
    assert_eq!(scheduler.cycle(), 0);
    assert!(h.exchange.calls().is_empty());
}

#[tokio::test]
async fn test_signal_after_some_ticks() {
    let h = Harness::new();
    h.prices.set("BTC-USDC", PriceReply::Price(dec!(50000)));
    let mut scheduler = Scheduler::new(vec![h.engine(btc_pair(), 1, 5)], Duration::from_millis(10));

    let reason = scheduler
        .run(tokio::time::sleep(Duration::from_millis(55)))
        .await;

    assert_eq!(reason, ShutdownReason::Signal);
    // Immediate first tick plus at least one interval tick.
    assert!(scheduler.cycle() >= 2);
    assert!(scheduler.engines()[0].state().cycles_succeeded >= 1);
}
