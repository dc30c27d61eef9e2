use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wellwatch_core::TelemetrySample;
use wellwatch_queue::{parse_batch, QueueConsumer};

use super::counters::bump;
use super::Shared;

pub(crate) struct ReaderConfig {
    pub(crate) batch_size: u32,
    /// Back-off after an empty poll or a transport error.
    pub(crate) poll_interval: Duration,
}

/// Shard owning `entity_id`. Stable for the life of the process.
pub(crate) fn shard_for(entity_id: &str, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    entity_id.hash(&mut hasher);
    (hasher.finish() % shards.max(1) as u64) as usize
}

/// Poll, parse, filter and route until cancelled. Cancellation is checked
/// between messages; whatever is left of the current batch is returned to the
/// transport.
pub(crate) async fn run(
    config: ReaderConfig,
    transport: Arc<dyn QueueConsumer>,
    shards: Vec<mpsc::Sender<TelemetrySample>>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    info!(batch_size = config.batch_size, shards = shards.len(), "Reader started");

    loop {
        let polled = tokio::select! {
            _ = cancel.cancelled() => break,
            polled = transport.poll_batch(config.batch_size) => polled,
        };

        let messages = match polled {
            Ok(messages) if !messages.is_empty() => messages,
            Ok(_) => {
                if pause(&cancel, config.poll_interval).await {
                    break;
                }
                continue;
            }
            Err(e) => {
                warn!(error = %e, retry_in = ?config.poll_interval, "Poll failed");
                if pause(&cancel, config.poll_interval).await {
                    break;
                }
                continue;
            }
        };

        let (samples, errors) = parse_batch(&messages);
        for (msg, _) in &errors {
            bump(&shared.counters.errors);
            if let Err(e) = transport.nack(&msg.receipt_handle).await {
                warn!(message_id = %msg.id, error = %e, "Failed to nack");
            }
        }

        let mut pending = samples.into_iter();
        while let Some((sample, handle)) = pending.next() {
            if cancel.is_cancelled() {
                let mut returned = 1;
                nack(&*transport, &handle).await;
                for (_, handle) in pending.by_ref() {
                    nack(&*transport, &handle).await;
                    returned += 1;
                }
                debug!(returned, "Cancelled mid-batch, returned unprocessed messages");
                break;
            }

            if !shared.settings.is_monitored(sample.entity_id()) {
                bump(&shared.counters.skipped);
                debug!(entity_id = %sample.entity_id(), "Entity not monitored, skipping");
                if let Err(e) = transport.ack(&handle).await {
                    warn!(error = %e, "Failed to ack skipped message");
                }
                continue;
            }

            let shard = shard_for(sample.entity_id(), shards.len());
            // Awaiting capacity is the ingestion backpressure; nothing is dropped here.
            if shards[shard].send(sample).await.is_err() {
                bump(&shared.counters.errors);
                warn!(shard, "Shard is gone, returning message");
                nack(&*transport, &handle).await;
                continue;
            }
            if let Err(e) = transport.ack(&handle).await {
                warn!(error = %e, "Failed to ack");
            }
        }
    }

    info!("Reader stopped");
}

async fn nack(transport: &dyn QueueConsumer, handle: &str) {
    if let Err(e) = transport.nack(handle).await {
        warn!(error = %e, "Failed to nack");
    }
}

/// Sleep unless cancelled first. Returns `true` on cancellation.
async fn pause(cancel: &CancellationToken, interval: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(interval) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_is_stable_and_in_range() {
        for shards in [1, 2, 7] {
            for id in ["well-1", "well-2", "pad-9/well-33", ""] {
                let s = shard_for(id, shards);
                assert!(s < shards);
                assert_eq!(s, shard_for(id, shards));
            }
        }
        assert_eq!(shard_for("anything", 0), 0);
    }
}
