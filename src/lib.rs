//! MMSIM — signed-request market-making simulator
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod signer;
pub mod exchange;
pub mod oracle;
pub mod alerts;
pub mod engine;
