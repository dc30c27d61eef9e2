//! Start/stop semantics of the telemetry engine.

mod common;

use serde_json::json;

use wellwatch_core::LifecycleState;
use wellwatch_engine::{EngineError, RuntimeSettingsUpdate};

use common::*;

#[tokio::test]
async fn stop_twice_is_a_no_op() {
    let h = harness(engine_config(4), constant_anomaly(0.0), constant_failure(0.0));

    // Stopping a never-started engine is fine too.
    h.engine.stop().await;

    h.engine.start().await.unwrap();
    assert!(h.engine.get_stats().running);
    assert!(h.transport.is_open());

    h.engine.stop().await;
    h.engine.stop().await;

    let stats = h.engine.get_stats();
    assert!(!stats.running);
    assert_eq!(stats.state, LifecycleState::Stopped);
    assert!(!h.transport.is_open());
}

#[tokio::test]
async fn start_is_idempotent_while_running() {
    let h = harness(engine_config(4), constant_anomaly(0.0), constant_failure(0.0));
    h.engine.start().await.unwrap();
    h.engine.start().await.unwrap();
    assert_eq!(h.engine.state(), LifecycleState::Running);
    h.engine.stop().await;
}

#[tokio::test]
async fn start_fails_when_transport_cannot_open() {
    let h = harness(engine_config(4), constant_anomaly(0.0), constant_failure(0.0));
    h.transport.fail_on_open();

    let err = h.engine.start().await.unwrap_err();
    assert!(matches!(err, EngineError::Transport(_)));
    assert_eq!(h.engine.state(), LifecycleState::Stopped);
    assert!(!h.engine.get_stats().running);
}

#[tokio::test]
async fn start_rejects_invalid_config() {
    let mut config = engine_config(4);
    config.shards = 0;
    let h = harness(config, constant_anomaly(0.0), constant_failure(0.0));

    let err = h.engine.start().await.unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
    assert_eq!(h.engine.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn windows_survive_a_restart() {
    let h = harness(engine_config(2), constant_anomaly(0.0), constant_failure(0.0));
    h.engine.start().await.unwrap();
    h.producer.send_json(&telemetry("well-1", 1, json!({"pump_temperature": 150.0}))).await.unwrap();
    wait_for(&h.engine, |s| s.processed_count == 1).await;
    h.engine.stop().await;
    assert_eq!(h.engine.get_stats().buffered_entities, 1);

    h.engine.start().await.unwrap();
    h.producer.send_json(&telemetry("well-1", 2, json!({"pump_temperature": 151.0}))).await.unwrap();
    let stats = wait_for(&h.engine, |s| s.processed_count == 2).await;
    // The second sample completes the window started before the restart.
    assert_eq!(stats.tier1_runs, 1);
    h.engine.stop().await;
}

#[tokio::test]
async fn engines_are_independent() {
    let a = harness(engine_config(2), constant_anomaly(0.0), constant_failure(0.0));
    let b = harness(engine_config(2), constant_anomaly(0.0), constant_failure(0.0));
    a.engine.start().await.unwrap();
    b.engine.start().await.unwrap();

    a.producer.send_json(&telemetry("well-1", 1, json!({"oil_rate": 500.0}))).await.unwrap();
    wait_for(&a.engine, |s| s.processed_count == 1).await;

    a.engine.stop().await;
    assert!(b.engine.get_stats().running);
    assert_eq!(b.engine.get_stats().processed_count, 0);
    b.engine.stop().await;
}

#[tokio::test]
async fn runtime_settings_are_validated() {
    let h = harness(engine_config(2), constant_anomaly(0.0), constant_failure(0.0));
    let bad = RuntimeSettingsUpdate { anomaly_threshold: Some(2.0), ..Default::default() };
    assert!(matches!(h.engine.update_settings(bad), Err(EngineError::Config(_))));

    let good = RuntimeSettingsUpdate { tier2_cadence: Some(3), ..Default::default() };
    h.engine.update_settings(good).unwrap();
}
