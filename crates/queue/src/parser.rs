//! Parse raw message bodies into [`TelemetrySample`]s.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use wellwatch_core::telemetry::{FeatureMap, TelemetrySample};

use crate::consumer::QueueMessage;
use crate::error::QueueError;

/// Field names for the entity id (tried in order).
const ENTITY_KEYS: &[&str] = &["entityId", "entity_id", "deviceId"];

const TENANT_KEYS: &[&str] = &["tenantId", "tenant_id"];

/// Field names for the epoch-millisecond sample time.
const TIMESTAMP_KEYS: &[&str] = &["ts", "timestamp"];

const DATA_KEYS: &[&str] = &["data", "values"];

fn probe<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn as_f64(v: &Value) -> Option<f64> {
    let f = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    f.filter(|f| f.is_finite())
}

fn as_millis(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Parse a single message body into a [`TelemetrySample`].
///
/// Expected shape: `{entityId, tenantId, ts, data: {feature: number}}`.
/// - **entityId** is required and must be a non-empty string
/// - **tenantId** defaults to empty
/// - **ts** falls back to the transport's message timestamp
/// - **data** keeps numeric values (and numeric strings); other values are
///   dropped. The message is rejected if no numeric feature remains.
pub fn parse_message(msg: &QueueMessage) -> Result<TelemetrySample, QueueError> {
    let json: Value = serde_json::from_str(&msg.body)
        .map_err(|e| QueueError::Parse(format!("Invalid JSON in message {}: {}", msg.id, e)))?;

    let obj = json
        .as_object()
        .ok_or_else(|| QueueError::Parse(format!("Message {} body is not a JSON object", msg.id)))?;

    let entity_id = probe(obj, ENTITY_KEYS)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| QueueError::Parse(format!("Message {} has no entityId", msg.id)))?;

    let tenant_id = probe(obj, TENANT_KEYS)
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    let ts = probe(obj, TIMESTAMP_KEYS)
        .and_then(as_millis)
        .unwrap_or_else(|| msg.timestamp.timestamp_millis());

    let data = probe(obj, DATA_KEYS)
        .and_then(|v| v.as_object())
        .ok_or_else(|| QueueError::Parse(format!("Message {} has no data object", msg.id)))?;

    let mut features = FeatureMap::with_capacity(data.len());
    for (name, value) in data {
        match as_f64(value) {
            Some(f) => {
                features.insert(name.clone(), f);
            }
            None => debug!(message_id = %msg.id, feature = %name, "Dropping non-numeric feature"),
        }
    }

    TelemetrySample::new(entity_id, tenant_id, ts, features)
        .map_err(|e| QueueError::Parse(format!("Message {}: {}", msg.id, e)))
}

/// Parse a batch of messages, separating successes from failures.
///
/// Returns `(samples, errors)` where each sample is paired with the receipt
/// handle of its message. Good messages are never blocked by bad ones.
pub fn parse_batch(
    messages: &[QueueMessage],
) -> (Vec<(TelemetrySample, String)>, Vec<(QueueMessage, QueueError)>) {
    let mut samples = Vec::with_capacity(messages.len());
    let mut errors = Vec::new();

    for msg in messages {
        match parse_message(msg) {
            Ok(sample) => samples.push((sample, msg.receipt_handle.clone())),
            Err(e) => {
                warn!(message_id = %msg.id, error = %e, "Failed to parse telemetry message");
                errors.push((msg.clone(), e));
            }
        }
    }

    (samples, errors)
}
