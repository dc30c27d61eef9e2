//! Explains FAILURE predictions: which thresholded features push risk up, and
//! what horizon and confidence the probability implies.

use wellwatch_core::catalog::{Bound, FailureThreshold, FAILURE_THRESHOLDS};
use wellwatch_core::{ContributingFactor, FactorTrend, FailureOutlook, FeatureMap, Impact};

pub const TOP_FACTORS: usize = 5;

/// Probability above which a failure horizon is estimated.
const HORIZON_PROBABILITY: f64 = 0.5;
/// Days-to-failure is `HORIZON_DAYS * (1 - p)`, floored.
const HORIZON_DAYS: f64 = 30.0;

/// Checks `features` against the failure thresholds, in catalog order, and
/// keeps the five most severe. Equal impacts keep catalog order.
pub fn analyze_contributing_factors(features: &FeatureMap) -> Vec<ContributingFactor> {
    analyze_with(FAILURE_THRESHOLDS, features)
}

pub fn analyze_with(thresholds: &[FailureThreshold], features: &FeatureMap) -> Vec<ContributingFactor> {
    let mut factors: Vec<ContributingFactor> = thresholds
        .iter()
        .filter_map(|t| {
            let value = *features.get(t.feature)?;
            let (impact, trend) = classify(t, value)?;
            Some(ContributingFactor {
                feature: t.feature.to_string(),
                current_value: value,
                threshold: t.limit,
                impact,
                trend,
                unit: t.unit.to_string(),
            })
        })
        .collect();
    factors.sort_by_key(|f| f.impact);
    factors.truncate(TOP_FACTORS);
    factors
}

fn classify(t: &FailureThreshold, value: f64) -> Option<(Impact, FactorTrend)> {
    let critical = t.critical_level();
    match t.bound {
        Bound::Upper => {
            if value > critical {
                Some((Impact::High, FactorTrend::Up))
            } else if value > t.limit {
                Some((Impact::Medium, FactorTrend::Up))
            } else if value > t.limit * 0.9 {
                Some((Impact::Low, FactorTrend::Stable))
            } else {
                None
            }
        }
        Bound::Lower => {
            if value < critical {
                Some((Impact::High, FactorTrend::Down))
            } else if value < t.limit {
                Some((Impact::Medium, FactorTrend::Down))
            } else if value < t.limit * 1.1 {
                Some((Impact::Low, FactorTrend::Stable))
            } else {
                None
            }
        }
    }
}

/// Days-to-failure and confidence for a failure probability `p` backed by
/// `factor_count` contributing factors.
pub fn failure_outlook(p: f64, factor_count: usize) -> FailureOutlook {
    let days_to_failure = if p > HORIZON_PROBABILITY {
        let days = (HORIZON_DAYS * (1.0 - p)).floor();
        (days > 0.0).then_some(days as u32)
    } else {
        None
    };

    let mut confidence = 2.0 * (p - 0.5).abs();
    if p > 0.5 && factor_count > 0 {
        confidence += (0.05 * factor_count as f64).min(0.2);
    } else if p < 0.5 && factor_count == 0 {
        confidence += 0.1;
    }
    let confidence = (confidence.min(1.0) * 10_000.0).round() / 10_000.0;

    FailureOutlook {
        probability: p,
        days_to_failure,
        confidence,
    }
}
