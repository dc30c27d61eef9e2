//! The transport seam between a message source and the stream consumer.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// One undecoded delivery. `receipt_handle` is what ack/nack take back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    pub id: String,
    pub body: String,
    pub receipt_handle: String,
    /// Provider send time.
    pub timestamp: DateTime<Utc>,
    /// Deliveries so far, this one included.
    pub attempt_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    pub connected: bool,
    pub approximate_message_count: Option<u64>,
    pub provider: String,
}

impl fmt::Display for QueueHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.connected { "up" } else { "down" };
        match self.approximate_message_count {
            Some(n) => write!(f, "{} {state}, ~{n} waiting", self.provider),
            None => write!(f, "{} {state}", self.provider),
        }
    }
}

/// Source of raw telemetry messages.
///
/// The engine calls `open` once per start and treats an error as fatal, then
/// polls until stopped and calls `close`. Every polled message is eventually
/// either acked or nacked exactly once. `close` may be called repeatedly.
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    async fn open(&self) -> Result<(), QueueError> {
        Ok(())
    }

    /// Up to `max_messages`; empty when nothing arrived within the provider's
    /// wait time.
    async fn poll_batch(&self, max_messages: u32) -> Result<Vec<QueueMessage>, QueueError>;

    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError>;

    /// Make the message deliverable again.
    async fn nack(&self, receipt_handle: &str) -> Result<(), QueueError>;

    async fn health_check(&self) -> Result<QueueHealth, QueueError>;

    async fn dlq_depth(&self) -> Result<Option<u64>, QueueError> {
        Ok(None)
    }

    async fn close(&self) -> Result<(), QueueError> {
        Ok(())
    }
}
