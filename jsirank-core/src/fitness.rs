/// Converting ranks and strengths into fitness values for an external optimizer.
use std::fmt;
use std::str::FromStr;

use crate::constants::{EXPONENTIAL_FITNESS_DECAY, FALLBACK_FITNESS_STEP, LINEAR_FITNESS_SPAN};

/// How a rank (0 = best) out of `n` valid solutions becomes a fitness value.
///
/// Every mapping is strictly decreasing in rank and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FitnessNormalization {
    /// `exp(-0.5 * rank)`
    #[default]
    Exponential,
    /// `1.0 - 0.9 * rank / (n - 1)`: from 1.0 down to 0.1.
    Linear,
    /// `1 / (rank + 1)`
    Inverse,
}

impl FitnessNormalization {
    pub fn fitness_for_rank(&self, rank: usize, n: usize) -> f64 {
        let r = rank as f64;
        match self {
            FitnessNormalization::Exponential => (-EXPONENTIAL_FITNESS_DECAY * r).exp(),
            FitnessNormalization::Linear => {
                let span = n.saturating_sub(1).max(1) as f64;
                1.0 - LINEAR_FITNESS_SPAN * r / span
            }
            FitnessNormalization::Inverse => 1.0 / (r + 1.0),
        }
    }

    /// Fitness for ranks `0..n`, best first.
    pub fn fitness_values(&self, n: usize) -> Vec<f64> {
        (0..n).map(|rank| self.fitness_for_rank(rank, n)).collect()
    }
}

impl fmt::Display for FitnessNormalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FitnessNormalization::Exponential => "exponential",
            FitnessNormalization::Linear => "linear",
            FitnessNormalization::Inverse => "inverse",
        };
        f.write_str(name)
    }
}

impl FromStr for FitnessNormalization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exponential" => Ok(FitnessNormalization::Exponential),
            "linear" => Ok(FitnessNormalization::Linear),
            "inverse" => Ok(FitnessNormalization::Inverse),
            other => Err(format!(
                "unknown fitness normalization \"{other}\" (expected exponential, linear or inverse)"
            )),
        }
    }
}

/// Fitness used when a population cannot be ranked: `1.0 - 0.01 * i` in input order.
pub fn fallback_fitness(n: usize) -> Vec<f64> {
    (0..n).map(|i| 1.0 - FALLBACK_FITNESS_STEP * i as f64).collect()
}

/// Softmax over log-strengths: `s_i^(1/T) / Σ s_j^(1/T)`. Sums to 1.0.
///
/// Higher `temperature` flattens the distribution, lower sharpens it.
pub fn softmax_strengths(strengths: &[f64], temperature: f64) -> Vec<f64> {
    if strengths.is_empty() {
        return Vec::new();
    }
    let scaled: Vec<f64> = strengths.iter().map(|s| s.ln() / temperature).collect();
    let max = scaled.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scaled.iter().map(|x| (x - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Min-max scaling of log-strengths into `[0, 1]`. All equal → 0.5 each.
pub fn min_max_strengths(strengths: &[f64]) -> Vec<f64> {
    let logs: Vec<f64> = strengths.iter().map(|s| s.ln()).collect();
    let min = logs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max > min) {
        return vec![0.5; strengths.len()];
    }
    logs.into_iter().map(|l| (l - min) / (max - min)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_fitness() {
        let values = FitnessNormalization::Exponential.fitness_values(3);
        assert_eq!(values[0], 1.0);
        assert!((values[1] - (-0.5f64).exp()).abs() < 1e-12);
        assert!((values[2] - (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_linear_fitness_spans_one_to_point_one() {
        let values = FitnessNormalization::Linear.fitness_values(4);
        assert_eq!(values[0], 1.0);
        assert!((values[3] - 0.1).abs() < 1e-12);
        assert!((values[1] - 0.7).abs() < 1e-12);
        // Single item: no division by zero.
        assert_eq!(FitnessNormalization::Linear.fitness_values(1), vec![1.0]);
    }

    #[test]
    fn test_inverse_fitness() {
        assert_eq!(FitnessNormalization::Inverse.fitness_values(4), vec![1.0, 0.5, 1.0 / 3.0, 0.25]);
    }

    #[test]
    fn test_all_mappings_strictly_decreasing_and_positive() {
        for norm in [FitnessNormalization::Exponential, FitnessNormalization::Linear, FitnessNormalization::Inverse] {
            let values = norm.fitness_values(30);
            assert!(values.windows(2).all(|w| w[0] > w[1]), "{norm} not decreasing");
            assert!(values.iter().all(|&v| v > 0.0), "{norm} not positive");
        }
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("Linear".parse::<FitnessNormalization>().unwrap(), FitnessNormalization::Linear);
        assert_eq!(FitnessNormalization::Inverse.to_string(), "inverse");
        assert!("cubic".parse::<FitnessNormalization>().is_err());
    }

    #[test]
    fn test_fallback_fitness_steps_down() {
        assert_eq!(fallback_fitness(3), vec![1.0, 0.99, 0.98]);
        assert!(fallback_fitness(0).is_empty());
    }

    #[test]
    fn test_softmax_sums_to_one_and_preserves_order() {
        let shares = softmax_strengths(&[4.0, 1.0, 0.25], 1.0);
        assert!((shares.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(shares[0] > shares[1] && shares[1] > shares[2]);
        // Temperature 1 on log-strengths is plain proportional share.
        assert!((shares[0] - 4.0 / 5.25).abs() < 1e-12);

        let flat = softmax_strengths(&[4.0, 1.0, 0.25], 100.0);
        assert!(flat[0] - flat[2] < shares[0] - shares[2]);
    }

    #[test]
    fn test_min_max_strengths() {
        assert_eq!(min_max_strengths(&[4.0, 1.0, 0.25]), vec![1.0, 0.5, 0.0]);
        assert_eq!(min_max_strengths(&[2.0, 2.0]), vec![0.5, 0.5]);
    }
}
