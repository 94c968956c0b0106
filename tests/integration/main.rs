//! Integration tests: cycle engine and scheduler against in-memory mocks.

mod cycle;
mod scheduler;
