//! Fixed-layout feature matrices from ordered samples.
//!
//! Live scoring and offline labeling both go through [`SequenceBuilder`], so a
//! window produces the same matrix in either path.

use wellwatch_core::catalog::SEQUENCE_FEATURES;
use wellwatch_core::TelemetrySample;

#[derive(Debug, Clone)]
pub struct SequenceBuilder {
    features: Vec<String>,
}

impl Default for SequenceBuilder {
    fn default() -> Self {
        Self::new(SEQUENCE_FEATURES.iter().map(|s| s.to_string()))
    }
}

impl SequenceBuilder {
    pub fn new(features: impl IntoIterator<Item = String>) -> Self {
        Self {
            features: features.into_iter().collect(),
        }
    }

    /// Column names, in matrix order.
    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// One row per sample, one column per feature.
    ///
    /// A feature missing from a sample takes the last value seen earlier in
    /// the same sequence, else `0.0`.
    pub fn build<'a, I>(&self, samples: I) -> Vec<Vec<f64>>
    where
        I: IntoIterator<Item = &'a TelemetrySample>,
    {
        let mut last: Vec<Option<f64>> = vec![None; self.features.len()];
        samples
            .into_iter()
            .map(|sample| {
                self.features
                    .iter()
                    .zip(last.iter_mut())
                    .map(|(name, carried)| {
                        if let Some(v) = sample.feature(name) {
                            *carried = Some(v);
                        }
                        carried.unwrap_or(0.0)
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wellwatch_core::FeatureMap;

    fn sample(ts: i64, pairs: &[(&str, f64)]) -> TelemetrySample {
        let f: FeatureMap = pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        TelemetrySample::new("well-1", "", ts, f).unwrap()
    }

    #[test]
    fn forward_fills_then_zero() {
        let b = SequenceBuilder::new(["a".to_string(), "b".to_string()]);
        let samples = vec![
            sample(1, &[("a", 1.0)]),
            sample(2, &[("b", 5.0)]),
            sample(3, &[("a", 3.0)]),
        ];
        let m = b.build(&samples);
        assert_eq!(m, vec![vec![1.0, 0.0], vec![1.0, 5.0], vec![3.0, 5.0]]);
    }

    #[test]
    fn default_layout_is_sensor_order() {
        let b = SequenceBuilder::default();
        assert_eq!(b.features().len(), 20);
        assert_eq!(b.features()[0], "pump_intake_pressure");
        let m = b.build(&[sample(1, &[("water_cut", 40.0)])]);
        assert_eq!(m[0].len(), 20);
        assert_eq!(m[0][19], 40.0);
    }

    #[test]
    fn empty_input() {
        let b = SequenceBuilder::default();
        assert!(b.build(std::iter::empty::<&TelemetrySample>()).is_empty());
    }
}
