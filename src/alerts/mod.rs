//! Alert delivery.
//!
//! The cycle engine and scheduler push human-readable status strings to an
//! `AlertSink`. Delivery is best-effort: `notify` never returns an error
//! and never aborts a cycle. Network sinks are wrapped in
//! [`BackgroundAlerts`] so a slow endpoint cannot hold up a pair.

pub mod telegram;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info};

pub use telegram::TelegramAlerts;

#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Send one message. Failures are logged and swallowed.
    async fn notify(&self, message: &str);

    /// Wait for messages still in flight. Called once before exit.
    async fn flush(&self) {}
}

/// Sink used when no chat credentials are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlerts;

#[async_trait]
impl AlertSink for LogAlerts {
    async fn notify(&self, message: &str) {
        info!(alert = %message, "Alert");
    }
}

/// Fire-and-forget wrapper: `notify` hands the message to a spawned task
/// and returns at once.
pub struct BackgroundAlerts {
    inner: Arc<dyn AlertSink>,
    pending: Mutex<JoinSet<()>>,
}

impl BackgroundAlerts {
    pub fn new(inner: Arc<dyn AlertSink>) -> Self {
        Self {
            inner,
            pending: Mutex::new(JoinSet::new()),
        }
    }
}

#[async_trait]
impl AlertSink for BackgroundAlerts {
    async fn notify(&self, message: &str) {
        let inner = self.inner.clone();
        let message = message.to_string();

        let mut pending = self.pending.lock().await;
        while pending.try_join_next().is_some() {}
        pending.spawn(async move { inner.notify(&message).await });
    }

    async fn flush(&self) {
        let mut pending = std::mem::take(&mut *self.pending.lock().await);
        debug!(pending = pending.len(), "Flushing alerts");
        while pending.join_next().await.is_some() {}
        self.inner.flush().await;
    }
}
