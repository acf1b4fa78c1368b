/// Iterative maximum-likelihood estimation for the Bradley-Terry model.
///
/// Minorization-maximization updates over binary win/loss records, with optional
/// ghost player regularization. Internal module: operates on `usize` indices,
/// not caller items.
use std::collections::HashMap;

use crate::constants::{LOG_LIKELIHOOD_TOLERANCE, LOG_STRENGTH_TOLERANCE, MAX_FIT_ITERATIONS};
use crate::error::FitError;
use crate::types::Comparison;

pub struct BradleyTerry {
    /// Number of real items (excluding ghost).
    num_items: usize,
    /// Total number of items including the ghost player when regularized.
    total: usize,
    /// Sparse wins: wins_table[i] maps opponent index -> wins of i over opponent.
    wins_table: Vec<HashMap<usize, f64>>,
    /// Total wins per item (precomputed for efficiency).
    total_wins: Vec<f64>,
    regularized: bool,
    /// Current scores (indices 0..num_items are real items, last is ghost if present).
    pub scores: Vec<f64>,
}

impl BradleyTerry {
    pub fn new(num_items: usize, comparisons: &[Comparison], regularization_strength: f64) -> Self {
        let regularized = regularization_strength > 0.0;
        let total = if regularized { num_items + 1 } else { num_items };

        let mut wins_table: Vec<HashMap<usize, f64>> = (0..total).map(|_| HashMap::new()).collect();
        for c in comparisons {
            *wins_table[c.winner].entry(c.loser).or_insert(0.0) += 1.0;
        }

        // Ghost player: every item wins and loses a fractional game against it.
        if regularized {
            let ghost_idx = num_items;
            for i in 0..num_items {
                *wins_table[i].entry(ghost_idx).or_insert(0.0) += regularization_strength;
                *wins_table[ghost_idx].entry(i).or_insert(0.0) += regularization_strength;
            }
        }

        let total_wins = wins_table
            .iter()
            .map(|row| row.values().sum())
            .collect();

        BradleyTerry {
            num_items,
            total,
            wins_table,
            total_wins,
            regularized,
            scores: vec![1.0; total],
        }
    }

    fn get_wins(&self, i: usize, j: usize) -> f64 {
        self.wins_table[i].get(&j).copied().unwrap_or(0.0)
    }

    /// Every opponent `i` has played at least once, each yielded once.
    fn opponents(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        let beaten = self.wins_table[i].keys().copied();
        let beaten_by = (0..self.total).filter(move |&j| {
            j != i && self.wins_table[j].contains_key(&i) && !self.wins_table[i].contains_key(&j)
        });
        beaten.chain(beaten_by)
    }

    /// Check that the MLE exists: every item both won and lost, and every item
    /// can reach every other through a chain of wins (strong connectivity).
    fn check_identifiable(&self) -> Result<(), FitError> {
        if self.regularized {
            return Ok(());
        }

        for i in 0..self.num_items {
            let wins = self.wins_table[i].values().sum::<f64>() as usize;
            let losses = (0..self.num_items).map(|j| self.get_wins(j, i)).sum::<f64>() as usize;
            if wins == 0 || losses == 0 {
                return Err(FitError::Degenerate { index: i, wins, losses });
            }
        }

        let components = self.count_components();
        if components > 1 {
            return Err(FitError::Disconnected { components });
        }

        let reach_forward = self.reachable_from(0, |bt, i, j| bt.get_wins(i, j) > 0.0);
        let reach_backward = self.reachable_from(0, |bt, i, j| bt.get_wins(j, i) > 0.0);
        if reach_forward < self.num_items || reach_backward < self.num_items {
            return Err(FitError::Dominated);
        }

        Ok(())
    }

    fn count_components(&self) -> usize {
        let mut seen = vec![false; self.num_items];
        let mut components = 0;
        for start in 0..self.num_items {
            if seen[start] {
                continue;
            }
            components += 1;
            let mut stack = vec![start];
            seen[start] = true;
            while let Some(i) = stack.pop() {
                for j in self.opponents(i) {
                    if !seen[j] {
                        seen[j] = true;
                        stack.push(j);
                    }
                }
            }
        }
        components
    }

    fn reachable_from(&self, start: usize, edge: impl Fn(&Self, usize, usize) -> bool) -> usize {
        let mut seen = vec![false; self.num_items];
        let mut stack = vec![start];
        seen[start] = true;
        let mut count = 1;
        while let Some(i) = stack.pop() {
            for j in 0..self.num_items {
                if !seen[j] && edge(self, i, j) {
                    seen[j] = true;
                    count += 1;
                    stack.push(j);
                }
            }
        }
        count
    }

    fn run_iteration(&mut self) {
        let mut new_scores = vec![0.0; self.total];

        for i in 0..self.total {
            let total_wins_i = self.total_wins[i];

            if total_wins_i == 0.0 {
                new_scores[i] = 0.0;
                continue;
            }

            let score_i = self.scores[i];
            let mut denominator = 0.0;

            for j in self.opponents(i) {
                let total_games = self.get_wins(i, j) + self.get_wins(j, i);
                let score_j = self.scores[j];
                if total_games > 0.0 && (score_i + score_j) > 0.0 {
                    denominator += total_games / (score_i + score_j);
                }
            }

            new_scores[i] = if denominator > 0.0 {
                total_wins_i / denominator
            } else {
                self.scores[i]
            };
        }

        self.scores = new_scores;
    }

    /// Normalize scores by dividing by the geometric mean of the real items.
    fn normalize_scores(&mut self) {
        let positive: Vec<f64> = self.scores[..self.num_items]
            .iter()
            .copied()
            .filter(|&s| s > 0.0)
            .collect();

        if positive.is_empty() {
            return;
        }

        let log_geo_mean = positive.iter().map(|s| s.ln()).sum::<f64>() / positive.len() as f64;
        let geo_mean = log_geo_mean.exp();

        if geo_mean > 0.0 && geo_mean.is_finite() {
            for score in &mut self.scores {
                *score /= geo_mean;
            }
        }
    }

    /// Log-likelihood of the observed wins under the current scores.
    pub fn log_likelihood(&self) -> f64 {
        let mut ll = 0.0;
        for i in 0..self.total {
            for (&j, &wins) in &self.wins_table[i] {
                let (s_i, s_j) = (self.scores[i], self.scores[j]);
                ll += wins * (s_i.ln() - (s_i + s_j).ln());
            }
        }
        ll
    }

    /// Largest change of any log-score between `before` and the current scores.
    fn max_log_step(&self, before: &[f64]) -> f64 {
        self.scores
            .iter()
            .zip(before)
            .map(|(now, then)| (now.ln() - then.ln()).abs())
            .fold(0.0, f64::max)
    }

    /// Run MM updates until both the log-likelihood and the scores stabilize.
    ///
    /// Returns the number of iterations used. Fails when the data cannot
    /// identify the strengths or the iteration cap is reached.
    pub fn calculate_scores(&mut self) -> Result<usize, FitError> {
        if self.num_items < 2 {
            return Err(FitError::TooFewItems { count: self.num_items });
        }
        self.check_identifiable()?;

        let mut previous = self.log_likelihood();
        for iteration in 1..=MAX_FIT_ITERATIONS {
            let before = self.scores.clone();
            self.run_iteration();
            self.normalize_scores();

            if let Some(index) = self.scores.iter().position(|s| !s.is_finite() || *s <= 0.0) {
                return Err(FitError::NonFinite { index });
            }

            let current = self.log_likelihood();
            if !current.is_finite() {
                return Err(FitError::NonFinite { index: 0 });
            }
            if (current - previous).abs() < LOG_LIKELIHOOD_TOLERANCE && self.max_log_step(&before) < LOG_STRENGTH_TOLERANCE {
                return Ok(iteration);
            }
            previous = current;
        }

        Err(FitError::NotConverged { iterations: MAX_FIT_ITERATIONS })
    }

    /// Scores for all real items (excluding ghost).
    pub fn real_scores(&self) -> &[f64] {
        &self.scores[..self.num_items]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beats(winner: usize, loser: usize, times: usize) -> Vec<Comparison> {
        vec![Comparison { winner, loser }; times]
    }

    fn round_robin() -> Vec<Comparison> {
        // 0 > 1 > 2, each pair 3:1
        [beats(0, 1, 3), beats(1, 0, 1), beats(1, 2, 3), beats(2, 1, 1), beats(0, 2, 3), beats(2, 0, 1)]
            .concat()
    }

    #[test]
    fn test_basic_ranking() {
        let mut bt = BradleyTerry::new(3, &round_robin(), 0.0);
        bt.calculate_scores().unwrap();

        let scores = bt.real_scores();
        assert!(scores[0] > scores[1]);
        assert!(scores[1] > scores[2]);
    }

    #[test]
    fn test_two_items_recover_win_ratio() {
        // 3 wins vs 1: MLE odds are exactly 3:1.
        let comparisons = [beats(0, 1, 3), beats(1, 0, 1)].concat();
        let mut bt = BradleyTerry::new(2, &comparisons, 0.0);
        bt.calculate_scores().unwrap();

        let scores = bt.real_scores();
        assert!((scores[0] / scores[1] - 3.0).abs() < 1e-4, "ratio {}", scores[0] / scores[1]);
    }

    #[test]
    fn test_geometric_mean_normalization() {
        let mut bt = BradleyTerry::new(3, &round_robin(), 0.0);
        bt.calculate_scores().unwrap();

        let log_mean = bt.real_scores().iter().map(|s| s.ln()).sum::<f64>() / 3.0;
        assert!(log_mean.abs() < 1e-9, "geometric mean should be 1.0, log mean {log_mean}");
    }

    #[test]
    fn test_undefeated_item_is_degenerate() {
        let comparisons = [beats(0, 1, 2), beats(1, 2, 1), beats(2, 1, 1)].concat();
        let mut bt = BradleyTerry::new(3, &comparisons, 0.0);
        assert!(matches!(bt.calculate_scores(), Err(FitError::Degenerate { index: 0, .. })));
    }

    #[test]
    fn test_disconnected_graph() {
        let comparisons = [beats(0, 1, 1), beats(1, 0, 1), beats(2, 3, 1), beats(3, 2, 1)].concat();
        let mut bt = BradleyTerry::new(4, &comparisons, 0.0);
        assert_eq!(bt.calculate_scores(), Err(FitError::Disconnected { components: 2 }));
    }

    #[test]
    fn test_dominated_group() {
        // {0,1} and {2,3} each balanced internally, but 0 beat 2 and nothing came back.
        let comparisons = [
            beats(0, 1, 1),
            beats(1, 0, 1),
            beats(2, 3, 1),
            beats(3, 2, 1),
            beats(0, 2, 1),
        ]
        .concat();
        let mut bt = BradleyTerry::new(4, &comparisons, 0.0);
        assert_eq!(bt.calculate_scores(), Err(FitError::Dominated));
    }

    #[test]
    fn test_regularization_rescues_degenerate_data() {
        // Perfectly consistent chain: 0 > 1 > 2, no upsets at all.
        let comparisons = [beats(0, 1, 1), beats(1, 2, 1), beats(0, 2, 1)].concat();
        let mut bt = BradleyTerry::new(3, &comparisons, 0.1);
        bt.calculate_scores().unwrap();

        let scores = bt.real_scores();
        assert!(scores[0] > scores[1]);
        assert!(scores[1] > scores[2]);
    }

    #[test]
    fn test_long_chain_converges_to_edge_ratios() {
        // Only neighbours meet, each 3:1. On a tree the MLE ratio of every edge is its win ratio.
        let n = 20;
        let comparisons: Vec<Comparison> = (0..n - 1)
            .flat_map(|i| [beats(i, i + 1, 3), beats(i + 1, i, 1)].concat())
            .collect();
        let mut bt = BradleyTerry::new(n, &comparisons, 0.0);
        let iterations = bt.calculate_scores().unwrap();
        assert!(iterations > 1000, "chain took only {iterations} iterations");

        let scores = bt.real_scores();
        for i in 0..n - 1 {
            let ratio = scores[i] / scores[i + 1];
            assert!((ratio - 3.0).abs() < 1e-4, "edge {i}: ratio {ratio}");
        }
    }

    #[test]
    fn test_fit_does_not_decrease_likelihood() {
        let comparisons = round_robin();
        let mut bt = BradleyTerry::new(3, &comparisons, 0.0);
        let before = bt.log_likelihood();
        bt.calculate_scores().unwrap();
        assert!(bt.log_likelihood() >= before);
    }
}
