use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use wellwatch_core::{ScoreMethod, ScoreResult};

/// How a placeholder decides `is_flagged`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlagRule {
    /// Flag independently of the score with this probability.
    Probability(f64),
    /// Flag when the score reaches the call's threshold.
    Threshold,
}

/// Score source for an untrained adapter. Results carry `method = MODEL`;
/// the adapter reports `trained() == false`.
#[derive(Debug)]
pub enum FallbackPolicy {
    Uniform {
        low: f64,
        high: f64,
        flag: FlagRule,
        rng: Mutex<StdRng>,
    },
    Constant { score: f64, flag: FlagRule },
}

impl FallbackPolicy {
    /// Uniform score in `[low, high)`. A seed makes the sequence reproducible.
    pub fn uniform(low: f64, high: f64, flag: FlagRule, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        Self::Uniform {
            low,
            high,
            flag,
            rng: Mutex::new(rng),
        }
    }

    pub fn constant(score: f64, flag: FlagRule) -> Self {
        Self::Constant { score, flag }
    }

    pub fn sample(&self, threshold: f64) -> ScoreResult {
        let (score, flagged) = match self {
            FallbackPolicy::Uniform { low, high, flag, rng } => {
                let mut rng = rng.lock().unwrap_or_else(|e| e.into_inner());
                let score = if high > low { rng.gen_range(*low..*high) } else { *low };
                let flagged = match flag {
                    FlagRule::Probability(p) => rng.gen_bool(p.clamp(0.0, 1.0)),
                    FlagRule::Threshold => score >= threshold,
                };
                (score, flagged)
            }
            FallbackPolicy::Constant { score, flag } => {
                let flagged = match flag {
                    FlagRule::Probability(p) => *p >= 1.0,
                    FlagRule::Threshold => *score >= threshold,
                };
                (*score, flagged)
            }
        };
        ScoreResult {
            score,
            is_flagged: flagged,
            method: ScoreMethod::Model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_stays_in_range() {
        let p = FallbackPolicy::uniform(0.1, 0.9, FlagRule::Threshold, Some(7));
        for _ in 0..1000 {
            let r = p.sample(0.7);
            assert!((0.1..0.9).contains(&r.score));
            assert_eq!(r.is_flagged, r.score >= 0.7);
            assert_eq!(r.method, ScoreMethod::Model);
        }
    }

    #[test]
    fn seeded_is_reproducible() {
        let a = FallbackPolicy::uniform(0.0, 1.0, FlagRule::Probability(0.1), Some(42));
        let b = FallbackPolicy::uniform(0.0, 1.0, FlagRule::Probability(0.1), Some(42));
        for _ in 0..50 {
            assert_eq!(a.sample(0.5), b.sample(0.5));
        }
    }

    #[test]
    fn probability_rule_rate() {
        let p = FallbackPolicy::uniform(0.0, 1.0, FlagRule::Probability(0.1), Some(3));
        let flagged = (0..10_000).filter(|_| p.sample(0.0).is_flagged).count();
        assert!((700..1300).contains(&flagged), "flagged {flagged}");
    }

    #[test]
    fn constant_policy() {
        let p = FallbackPolicy::constant(0.4, FlagRule::Threshold);
        assert!(!p.sample(0.5).is_flagged);
        assert!(p.sample(0.3).is_flagged);
        let always = FallbackPolicy::constant(0.0, FlagRule::Probability(1.0));
        assert!(always.sample(0.9).is_flagged);
    }
}
