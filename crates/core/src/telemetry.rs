use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Feature name → value, in the order the values arrived.
pub type FeatureMap = IndexMap<String, f64>;

/// One validated sensor reading for one entity.
///
/// Construction goes through [`TelemetrySample::new`], which rejects an empty
/// entity id or an empty feature map. Fields are private so a sample cannot be
/// mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SampleRecord", into = "SampleRecord")]
pub struct TelemetrySample {
    entity_id: String,
    tenant_id: String,
    timestamp_ms: i64,
    features: FeatureMap,
}

impl TelemetrySample {
    pub fn new(
        entity_id: impl Into<String>,
        tenant_id: impl Into<String>,
        timestamp_ms: i64,
        features: FeatureMap,
    ) -> Result<Self, CoreError> {
        let entity_id = entity_id.into();
        if entity_id.trim().is_empty() {
            return Err(CoreError::InvalidSample("missing entity id".into()));
        }
        if features.is_empty() {
            return Err(CoreError::InvalidSample(format!(
                "entity {entity_id} has an empty feature map"
            )));
        }
        Ok(Self {
            entity_id,
            tenant_id: tenant_id.into(),
            timestamp_ms,
            features,
        })
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Epoch milliseconds as reported by the producer.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_ms).single()
    }

    pub fn features(&self) -> &FeatureMap {
        &self.features
    }

    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }
}

/// Plain serde shape of a sample, used for JSON Lines datasets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SampleRecord {
    entity_id: String,
    #[serde(default)]
    tenant_id: String,
    ts: i64,
    data: FeatureMap,
}

impl TryFrom<SampleRecord> for TelemetrySample {
    type Error = CoreError;

    fn try_from(r: SampleRecord) -> Result<Self, Self::Error> {
        TelemetrySample::new(r.entity_id, r.tenant_id, r.ts, r.data)
    }
}

impl From<TelemetrySample> for SampleRecord {
    fn from(s: TelemetrySample) -> Self {
        Self {
            entity_id: s.entity_id,
            tenant_id: s.tenant_id,
            ts: s.timestamp_ms,
            data: s.features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(pairs: &[(&str, f64)]) -> FeatureMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn rejects_blank_entity() {
        let err = TelemetrySample::new("  ", "t1", 0, features(&[("a", 1.0)])).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSample(_)));
    }

    #[test]
    fn rejects_empty_features() {
        let err = TelemetrySample::new("well-1", "t1", 0, FeatureMap::new()).unwrap_err();
        assert!(err.to_string().contains("empty feature map"));
    }

    #[test]
    fn serde_uses_wire_field_names() {
        let s = TelemetrySample::new("well-1", "t1", 1_700_000_000_000, features(&[("b", 2.0), ("a", 1.0)]))
            .unwrap();
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"entityId\":\"well-1\""));
        assert!(json.contains("\"ts\":1700000000000"));

        let back: TelemetrySample = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
        // Arrival order of the feature map survives.
        let keys: Vec<_> = back.features().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn deserialize_validates() {
        let bad = r#"{"entityId":"well-1","ts":1,"data":{}}"#;
        assert!(serde_json::from_str::<TelemetrySample>(bad).is_err());
    }
}
