//! `run` and `replay`: the telemetry engine over SQS or a file.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use wellwatch_core::{Config, ConsumerStats};
use wellwatch_engine::{
    AnomalyAdapter, FailureAdapter, JsonLinesEmitter, LogEmitter, PredictionEmitter, TelemetryEngine,
};
use wellwatch_queue::{channel_queue, QueueConsumer, SqsConsumer};

use crate::cli::OutputArgs;

fn emitter(output: &OutputArgs) -> Result<Arc<dyn PredictionEmitter>> {
    if output.log_only {
        return Ok(Arc::new(LogEmitter));
    }
    match &output.predictions {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            Ok(Arc::new(JsonLinesEmitter::new(Box::new(file))))
        }
        None => Ok(Arc::new(JsonLinesEmitter::stdout())),
    }
}

/// Adapters are chosen once here: trained when the artifact loads, untrained
/// when no artifact is configured or the file is absent.
fn build_engine(
    config: &Config,
    transport: Arc<dyn QueueConsumer>,
    output: &OutputArgs,
) -> Result<TelemetryEngine> {
    let anomaly = AnomalyAdapter::from_artifact_path(config.models.anomaly_artifact.as_deref())
        .context("failed to load anomaly artifact")?;
    let failure = FailureAdapter::from_artifact_path(config.models.failure_artifact.as_deref())
        .context("failed to load failure artifact")?;
    info!(
        anomaly_trained = matches!(anomaly, AnomalyAdapter::Trained(_)),
        failure_trained = matches!(failure, FailureAdapter::Trained(_)),
        "Scoring adapters ready"
    );
    Ok(TelemetryEngine::new(
        config.engine.clone(),
        transport,
        Arc::new(anomaly),
        Arc::new(failure),
        emitter(output)?,
    ))
}

fn log_stats(stats: &ConsumerStats) {
    info!(
        state = %stats.state,
        processed = stats.processed_count,
        errors = stats.error_count,
        skipped = stats.skipped_count,
        entities = stats.buffered_entities,
        tier1 = stats.tier1_runs,
        tier2 = stats.tier2_runs,
        tier2_dropped = stats.tier2_dropped,
        emitted = stats.emitted_count,
        "Engine stats"
    );
}

pub async fn run(config: &Config, output: &OutputArgs, stats_interval: u64) -> Result<()> {
    let consumer = SqsConsumer::new(&config.aws, &config.queue)
        .await
        .context("failed to create SQS consumer")?;
    let engine = Arc::new(build_engine(config, Arc::new(consumer), output)?);
    engine.start().await.context("engine failed to start")?;

    let reporter = (stats_interval > 0).then(|| {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(stats_interval));
            interval.tick().await;
            loop {
                interval.tick().await;
                log_stats(&engine.get_stats());
                match engine.transport_health().await {
                    Ok(health) => info!(transport = %health, "Transport health"),
                    Err(e) => warn!(error = %e, "Transport health check failed"),
                }
            }
        })
    });

    shutdown_signal().await;
    info!("Shutdown signal received");
    if let Some(reporter) = reporter {
        reporter.abort();
    }
    engine.stop().await;
    log_stats(&engine.get_stats());
    Ok(())
}

pub async fn replay(config: &Config, input: &Path, output: &OutputArgs) -> Result<()> {
    let (producer, consumer) = channel_queue(
        config.engine.shard_queue_capacity,
        Duration::from_millis(config.engine.poll_interval_ms),
    );
    let consumer = Arc::new(consumer);
    let engine = build_engine(config, consumer.clone(), output)?;
    engine.start().await.context("engine failed to start")?;

    let file = tokio::fs::File::open(input)
        .await
        .with_context(|| format!("failed to open {}", input.display()))?;
    let mut lines = BufReader::new(file).lines();
    let mut sent = 0u64;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        producer.send_body(line).await.context("replay queue closed")?;
        sent += 1;
    }
    info!(messages = sent, file = %input.display(), "Replay input queued");

    // Every message ends up processed, skipped or returned to the queue.
    loop {
        let stats = engine.get_stats();
        if stats.processed_count + stats.skipped_count + consumer.nacked() >= sent {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    settle_tier2(&engine).await;

    engine.stop().await;
    log_stats(&engine.get_stats());
    Ok(())
}

/// Wait until Tier-2 counters stop moving so queued jobs are not discarded
/// by the stop.
async fn settle_tier2(engine: &TelemetryEngine) {
    let quiet = Duration::from_millis(250);
    let mut last = (u64::MAX, u64::MAX);
    loop {
        let s = engine.get_stats();
        let now = (s.tier2_runs + s.tier2_dropped, s.emitted_count + s.emit_failures);
        if now == last {
            return;
        }
        last = now;
        tokio::time::sleep(quiet).await;
    }
}

/// Wait for SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
