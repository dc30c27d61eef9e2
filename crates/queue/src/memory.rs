//! In-process transport over a bounded tokio channel.
//!
//! Used for file replay and tests. Messages are consumed on poll; `ack` and
//! `nack` only count, since there is nothing to redeliver to.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::consumer::{QueueConsumer, QueueHealth, QueueMessage};
use crate::error::QueueError;

/// Create a connected producer/consumer pair.
///
/// `wait` bounds how long an empty poll blocks, like an SQS long poll.
pub fn channel_queue(capacity: usize, wait: Duration) -> (ChannelProducer, ChannelConsumer) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ChannelProducer { tx },
        ChannelConsumer {
            rx: Mutex::new(rx),
            wait,
            open: AtomicBool::new(false),
            acked: AtomicU64::new(0),
            nacked: AtomicU64::new(0),
            refuse_open: AtomicBool::new(false),
        },
    )
}

#[derive(Clone)]
pub struct ChannelProducer {
    tx: mpsc::Sender<QueueMessage>,
}

impl ChannelProducer {
    /// Enqueue a raw body, waiting for capacity.
    pub async fn send_body(&self, body: impl Into<String>) -> Result<(), QueueError> {
        let id = Uuid::new_v4().to_string();
        let msg = QueueMessage {
            receipt_handle: id.clone(),
            id,
            body: body.into(),
            timestamp: Utc::now(),
            attempt_count: 1,
        };
        self.tx.send(msg).await.map_err(|_| QueueError::Closed)
    }

    pub async fn send_json(&self, value: &serde_json::Value) -> Result<(), QueueError> {
        self.send_body(value.to_string()).await
    }
}

pub struct ChannelConsumer {
    rx: Mutex<mpsc::Receiver<QueueMessage>>,
    wait: Duration,
    open: AtomicBool,
    acked: AtomicU64,
    nacked: AtomicU64,
    refuse_open: AtomicBool,
}

impl ChannelConsumer {
    /// Make the next `open()` fail, simulating an unreachable transport.
    pub fn fail_on_open(&self) {
        self.refuse_open.store(true, Ordering::Relaxed);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    pub fn acked(&self) -> u64 {
        self.acked.load(Ordering::Relaxed)
    }

    pub fn nacked(&self) -> u64 {
        self.nacked.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl QueueConsumer for ChannelConsumer {
    async fn open(&self) -> Result<(), QueueError> {
        if self.refuse_open.load(Ordering::Relaxed) {
            return Err(QueueError::Connection("memory transport refused to open".into()));
        }
        self.open.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn poll_batch(&self, max_messages: u32) -> Result<Vec<QueueMessage>, QueueError> {
        if !self.is_open() {
            return Err(QueueError::Closed);
        }
        let mut rx = self.rx.lock().await;
        let mut batch = Vec::new();

        // Block for the first message, then take whatever is already queued.
        match tokio::time::timeout(self.wait, rx.recv()).await {
            Ok(Some(msg)) => batch.push(msg),
            Ok(None) => {
                // All producers dropped; behave like an idle long poll.
                drop(rx);
                tokio::time::sleep(self.wait).await;
                return Ok(batch);
            }
            Err(_) => return Ok(batch),
        }
        while batch.len() < max_messages as usize {
            match rx.try_recv() {
                Ok(msg) => batch.push(msg),
                Err(_) => break,
            }
        }

        debug!(count = batch.len(), "Polled memory transport");
        Ok(batch)
    }

    async fn ack(&self, _receipt_handle: &str) -> Result<(), QueueError> {
        self.acked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn nack(&self, _receipt_handle: &str) -> Result<(), QueueError> {
        self.nacked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn health_check(&self) -> Result<QueueHealth, QueueError> {
        let pending = self.rx.lock().await.len() as u64;
        Ok(QueueHealth {
            connected: self.is_open(),
            approximate_message_count: Some(pending),
            provider: "memory".to_string(),
        })
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.open.store(false, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn poll_requires_open() {
        let (_tx, rx) = channel_queue(4, Duration::from_millis(10));
        assert!(matches!(rx.poll_batch(10).await, Err(QueueError::Closed)));
    }

    #[tokio::test]
    async fn polls_in_order_up_to_max() {
        let (tx, rx) = channel_queue(16, Duration::from_millis(10));
        rx.open().await.unwrap();
        for i in 0..5 {
            tx.send_body(format!("{{\"n\":{i}}}")).await.unwrap();
        }

        let first = rx.poll_batch(3).await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].body, "{\"n\":0}");
        let rest = rx.poll_batch(10).await.unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[1].body, "{\"n\":4}");

        let health = rx.health_check().await.unwrap();
        assert_eq!(health.approximate_message_count, Some(0));
        assert_eq!(health.provider, "memory");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_poll_times_out() {
        let (_tx, rx) = channel_queue(4, Duration::from_secs(20));
        rx.open().await.unwrap();
        let batch = rx.poll_batch(10).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn open_failure_and_close() {
        let (_tx, rx) = channel_queue(4, Duration::from_millis(10));
        rx.fail_on_open();
        assert!(matches!(rx.open().await, Err(QueueError::Connection(_))));
        assert!(!rx.is_open());

        let (_tx, rx) = channel_queue(4, Duration::from_millis(10));
        rx.open().await.unwrap();
        rx.close().await.unwrap();
        rx.close().await.unwrap();
        assert!(!rx.is_open());
    }
}
