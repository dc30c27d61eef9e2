use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Learned distribution of one feature, fitted once at training time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatistics {
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub iqr: f64,
}

/// Feature name → statistics, in fitting order.
pub type FeatureStatisticsTable = IndexMap<String, FeatureStatistics>;

impl FeatureStatistics {
    /// Fit from raw observations. Non-finite values are ignored; returns `None`
    /// when nothing usable remains.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        let p25 = percentile(&sorted, 0.25);
        let p75 = percentile(&sorted, 0.75);
        Some(Self {
            mean,
            std: variance.sqrt(),
            p25,
            p50: percentile(&sorted, 0.50),
            p75,
            iqr: p75 - p25,
        })
    }

    /// `|value - mean| / max(std, ε)`.
    pub fn z_score(&self, value: f64) -> f64 {
        (value - self.mean).abs() / self.std.max(f64::EPSILON)
    }

    /// Tukey fences: `(p25 - 1.5·iqr, p75 + 1.5·iqr)`.
    pub fn iqr_bounds(&self) -> (f64, f64) {
        (self.p25 - 1.5 * self.iqr, self.p75 + 1.5 * self.iqr)
    }

    pub fn is_iqr_outlier(&self, value: f64) -> bool {
        let (lower, upper) = self.iqr_bounds();
        value < lower || value > upper
    }
}

/// Linear-interpolation percentile over sorted data, `q` in `[0, 1]`.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
