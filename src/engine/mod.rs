//! Core engine — the per-pair cancel → ladder → self-cross cycle and the
//! scheduler that fans it out across pairs.

pub mod ladder;
pub mod cycle;
pub mod scheduler;

pub use cycle::{CycleOutcome, CycleSettings, PairEngine};
pub use scheduler::{Scheduler, ShutdownReason, TickReport};
