//! Ranks which features of a sample sit outside their expected envelope.

use wellwatch_core::catalog::{ExpectedRange, EXPECTED_RANGES};
use wellwatch_core::{FeatureDeviation, FeatureMap, FeatureStatisticsTable};

/// Candidates kept after ranking.
pub const TOP_DEVIATIONS: usize = 5;

/// z-score that maps to a deviation score of 1.0.
const Z_FULL_DEVIATION: f64 = 3.0;

/// Walks the sample's features in arrival order, keeps the ones with an
/// expected range that are flagged by the range check or the IQR check, then
/// sorts by `deviation_score` descending. The sort is stable, so ties keep
/// the sample's order.
#[derive(Debug, Clone)]
pub struct FeatureDeviationAnalyzer {
    ranges: Vec<ExpectedRange>,
    top_n: usize,
}

impl Default for FeatureDeviationAnalyzer {
    fn default() -> Self {
        Self::new(EXPECTED_RANGES.to_vec())
    }
}

impl FeatureDeviationAnalyzer {
    pub fn new(ranges: Vec<ExpectedRange>) -> Self {
        Self {
            ranges,
            top_n: TOP_DEVIATIONS,
        }
    }

    pub fn analyze(
        &self,
        features: &FeatureMap,
        stats: Option<&FeatureStatisticsTable>,
    ) -> Vec<FeatureDeviation> {
        let mut out = self.candidates(features, stats);
        out.sort_by(|a, b| b.deviation_score.total_cmp(&a.deviation_score));
        out.truncate(self.top_n);
        out
    }

    /// Every flagged feature, unranked, in sample order.
    pub fn candidates(
        &self,
        features: &FeatureMap,
        stats: Option<&FeatureStatisticsTable>,
    ) -> Vec<FeatureDeviation> {
        let mut out = Vec::new();
        for (name, &value) in features {
            let Some(range) = self.range(name) else {
                continue;
            };
            let out_of_range = !range.contains(value);

            let learned = stats.and_then(|t| t.get(range.feature));
            let (iqr_outlier, deviation_score) = match learned {
                Some(s) => (
                    s.is_iqr_outlier(value),
                    round4((s.z_score(value) / Z_FULL_DEVIATION).min(1.0)),
                ),
                None => (false, 0.0),
            };

            if out_of_range || iqr_outlier {
                out.push(FeatureDeviation {
                    feature: range.feature.to_string(),
                    current_value: value,
                    expected_min: range.min,
                    expected_max: range.max,
                    deviation_score,
                    unit: range.unit.to_string(),
                });
            }
        }
        out
    }

    fn range(&self, feature: &str) -> Option<&ExpectedRange> {
        self.ranges.iter().find(|r| r.feature == feature)
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
