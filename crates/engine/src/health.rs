//! Deterministic well-health assessment attached to HEALTH predictions.
//!
//! Each component (pump, motor, production) scores `100 × (1 − worst penalty)`
//! over its features. A feature's penalty is the larger of its out-of-range
//! penalty and its statistical deviation. The overall score is the weighted
//! mean of the components that had data, blended with `1 − p(failure)`.

use std::collections::BTreeMap;

use wellwatch_core::catalog::{expected_range, Component};
use wellwatch_core::{FeatureMap, FeatureStatisticsTable, HealthAssessment, HealthLevel, HealthTrend};

/// Weight of the `(1 − failure probability)` term in the overall score.
const FAILURE_RISK_WEIGHT: f64 = 0.20;

/// Score change (points) needed to call a trend.
const TREND_DELTA: i16 = 5;

const Z_FULL_PENALTY: f64 = 3.0;

pub fn level_for(score: u8) -> HealthLevel {
    match score {
        0..=29 => HealthLevel::Critical,
        30..=49 => HealthLevel::Poor,
        50..=69 => HealthLevel::Fair,
        70..=84 => HealthLevel::Good,
        _ => HealthLevel::Excellent,
    }
}

pub fn trend_for(score: u8, previous: Option<u8>) -> HealthTrend {
    let Some(prev) = previous else {
        return HealthTrend::Stable;
    };
    let delta = score as i16 - prev as i16;
    if delta >= TREND_DELTA {
        HealthTrend::Improving
    } else if delta <= -TREND_DELTA {
        HealthTrend::Degrading
    } else {
        HealthTrend::Stable
    }
}

/// Penalty in `[0, 1]` for one feature value.
fn feature_penalty(feature: &str, value: f64, stats: Option<&FeatureStatisticsTable>) -> f64 {
    let range_penalty = match expected_range(feature) {
        Some(r) if !r.contains(value) => {
            let span = (r.max - r.min).max(f64::EPSILON);
            let excess = if value > r.max { value - r.max } else { r.min - value };
            0.5 + 0.5 * (excess / span).min(1.0)
        }
        _ => 0.0,
    };
    let stat_penalty = stats
        .and_then(|t| t.get(feature))
        .map(|s| (s.z_score(value) / Z_FULL_PENALTY).min(1.0))
        .unwrap_or(0.0);
    range_penalty.max(stat_penalty)
}

fn to_points(fraction: f64) -> u8 {
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Assess one entity from its latest features.
///
/// `previous` is the score from the entity's last assessment and drives the trend.
pub fn assess(
    features: &FeatureMap,
    stats: Option<&FeatureStatisticsTable>,
    failure_probability: Option<f64>,
    previous: Option<u8>,
) -> HealthAssessment {
    let mut worst: BTreeMap<&'static str, (Component, f64)> = BTreeMap::new();
    for (name, value) in features {
        let Some(component) = Component::of(name) else {
            continue;
        };
        let penalty = feature_penalty(name, *value, stats);
        let entry = worst.entry(component.name()).or_insert((component, 0.0));
        entry.1 = entry.1.max(penalty);
    }

    let mut component_scores = BTreeMap::new();
    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for (name, (component, penalty)) in &worst {
        let health = 1.0 - penalty;
        component_scores.insert(name.to_string(), to_points(health));
        weighted += component.weight() * health;
        total_weight += component.weight();
    }
    if let Some(p) = failure_probability {
        weighted += FAILURE_RISK_WEIGHT * (1.0 - p.clamp(0.0, 1.0));
        total_weight += FAILURE_RISK_WEIGHT;
    }

    let overall = if total_weight > 0.0 { weighted / total_weight } else { 1.0 };
    let score = to_points(overall);

    HealthAssessment {
        score,
        level: level_for(score),
        trend: trend_for(score, previous),
        component_scores,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wellwatch_core::FeatureStatistics;

    fn features(pairs: &[(&str, f64)]) -> FeatureMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn levels_follow_score_bands() {
        assert_eq!(level_for(0), HealthLevel::Critical);
        assert_eq!(level_for(29), HealthLevel::Critical);
        assert_eq!(level_for(30), HealthLevel::Poor);
        assert_eq!(level_for(50), HealthLevel::Fair);
        assert_eq!(level_for(70), HealthLevel::Good);
        assert_eq!(level_for(84), HealthLevel::Good);
        assert_eq!(level_for(85), HealthLevel::Excellent);
        assert_eq!(level_for(100), HealthLevel::Excellent);
    }

    #[test]
    fn trend_needs_five_points() {
        assert_eq!(trend_for(80, None), HealthTrend::Stable);
        assert_eq!(trend_for(80, Some(76)), HealthTrend::Stable);
        assert_eq!(trend_for(80, Some(75)), HealthTrend::Improving);
        assert_eq!(trend_for(70, Some(75)), HealthTrend::Degrading);
    }

    #[test]
    fn healthy_well_scores_full_marks() {
        let f = features(&[("pump_temperature", 150.0), ("motor_current", 60.0), ("oil_rate", 800.0)]);
        let h = assess(&f, None, None, None);
        assert_eq!(h.score, 100);
        assert_eq!(h.level, HealthLevel::Excellent);
        assert_eq!(h.component_scores.len(), 3);
        assert!(h.component_scores.values().all(|s| *s == 100));
    }

    #[test]
    fn out_of_range_feature_drags_its_component() {
        // 220 F is 40 past a 80-wide range: penalty 0.5 + 0.25.
        let f = features(&[("pump_temperature", 220.0), ("motor_current", 60.0)]);
        let h = assess(&f, None, None, None);
        assert_eq!(h.component_scores["pump"], 25);
        assert_eq!(h.component_scores["motor"], 100);
        assert!(!h.component_scores.contains_key("production"));
        // (0.30 × 0.25 + 0.25 × 1.0) / 0.55
        assert_eq!(h.score, 59);
        assert_eq!(h.level, HealthLevel::Fair);
    }

    #[test]
    fn statistics_and_failure_risk_lower_the_score() {
        let mut stats = FeatureStatisticsTable::new();
        stats.insert(
            "motor_current".into(),
            FeatureStatistics { mean: 60.0, std: 5.0, p25: 57.0, p50: 60.0, p75: 63.0, iqr: 6.0 },
        );
        // In range, but z = 1.5 -> penalty 0.5.
        let f = features(&[("motor_current", 67.5)]);
        let h = assess(&f, Some(&stats), None, None);
        assert_eq!(h.component_scores["motor"], 50);
        assert_eq!(h.score, 50);

        let h = assess(&f, Some(&stats), Some(0.9), Some(70));
        // (0.25 × 0.5 + 0.2 × 0.1) / 0.45
        assert_eq!(h.score, 32);
        assert_eq!(h.level, HealthLevel::Poor);
        assert_eq!(h.trend, HealthTrend::Degrading);
    }
}
