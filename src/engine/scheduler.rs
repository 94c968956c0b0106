//! Tick scheduler.
//!
//! Fires an immediate first tick, then one every `interval`. Each tick runs
//! every pair's cycle concurrently on the current task and waits for all of
//! them to settle before the next tick can start. A fatal stop from any
//! pair drops the remaining in-flight cycles and ends the run.

use std::future::Future;
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::cycle::{CycleOutcome, PairEngine};
use crate::types::FatalStop;

/// Why the scheduler stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Interrupt or termination signal.
    Signal,
    Fatal(FatalStop),
}

impl ShutdownReason {
    pub fn exit_code(&self) -> u8 {
        match self {
            ShutdownReason::Signal => 0,
            ShutdownReason::Fatal(stop) => stop.exit_code(),
        }
    }
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::Signal => write!(f, "shutdown signal"),
            ShutdownReason::Fatal(stop) => write!(f, "{stop}"),
        }
    }
}

/// Summary of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub cycle: u64,
    pub succeeded: usize,
    pub degraded: usize,
    pub orders_placed: usize,
    pub elapsed: Duration,
}

pub struct Scheduler {
    engines: Vec<PairEngine>,
    interval: Duration,
    cycle: u64,
}

impl Scheduler {
    pub fn new(engines: Vec<PairEngine>, interval: Duration) -> Self {
        Self {
            engines,
            interval,
            cycle: 0,
        }
    }

    pub fn engines(&self) -> &[PairEngine] {
        &self.engines
    }

    /// Ticks completed or started so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Run every pair once, concurrently.
    pub async fn run_tick(&mut self) -> Result<TickReport, FatalStop> {
        self.cycle += 1;
        let cycle = self.cycle;
        let started = Instant::now();

        let outcomes = try_join_all(
            self.engines
                .iter_mut()
                .map(|engine| engine.run_cycle(cycle)),
        )
        .await?;

        let mut report = TickReport {
            cycle,
            succeeded: 0,
            degraded: 0,
            orders_placed: 0,
            elapsed: started.elapsed(),
        };
        for outcome in outcomes {
            match outcome {
                CycleOutcome::Succeeded { orders_placed, .. } => {
                    report.succeeded += 1;
                    report.orders_placed += orders_placed;
                }
                CycleOutcome::Degraded { .. } => report.degraded += 1,
            }
        }
        Ok(report)
    }

    /// Tick until `shutdown` resolves or a pair stops the process.
    pub async fn run<F>(&mut self, shutdown: F) -> ShutdownReason
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let symbols: Vec<&str> = self
            .engines
            .iter()
            .map(|engine| engine.pair().symbol.as_str())
            .collect();
        info!(
            pairs = %symbols.join(", "),
            interval_ms = self.interval.as_millis() as u64,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => return ShutdownReason::Signal,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => return ShutdownReason::Signal,
                result = self.run_tick() => match result {
                    Ok(report) => log_tick_report(&report),
                    Err(stop) => {
                        error!(error = %stop, "Fatal stop");
                        return ShutdownReason::Fatal(stop);
                    }
                },
            }
        }
    }
}

fn log_tick_report(report: &TickReport) {
    info!(
        cycle = report.cycle,
        succeeded = report.succeeded,
        failed = report.degraded,
        orders = report.orders_placed,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Cycle complete"
    );
}
