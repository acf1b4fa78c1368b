/// Comparison log and the rankings derived from it.
///
/// Nothing derived is stored: every query recomputes from the append-only log,
/// so there is no stale model state to invalidate. `RankingTracker` layers a
/// cache on top when reads are frequent.
use tracing::debug;

use crate::bradley_terry::BradleyTerry;
use crate::constants::{CONFIDENCE_DENSITY_SCALE, MAX_CONFIDENCE, MIN_COMPARISONS_FOR_FIT, NEUTRAL_WIN_RATE};
use crate::error::{FitError, RankingError};
use crate::types::{Comparison, FittedRanking, IdMap, ItemKey, WinLoss};

/// Options for the Bradley-Terry fit.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitOptions {
    /// Ghost player regularization strength. 0.0 disables it, which makes
    /// undefeated or winless items fall back to the win-rate ranking.
    pub regularization_strength: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions { regularization_strength: 0.0 }
    }
}

/// Fraction of all unordered item pairs covered by the log, counting repeats.
pub fn comparison_density(num_comparisons: usize, num_items: usize) -> f64 {
    let possible_pairs = num_items * num_items.saturating_sub(1) / 2;
    if possible_pairs == 0 {
        return 0.0;
    }
    num_comparisons as f64 / possible_pairs as f64
}

/// `min(MAX_CONFIDENCE, 2 * density)`.
pub fn confidence_from_density(density: f64) -> f64 {
    (CONFIDENCE_DENSITY_SCALE * density).clamp(0.0, MAX_CONFIDENCE)
}

#[derive(Debug, Clone)]
pub struct RankingState<T> {
    id_map: IdMap<T>,
    comparisons: Vec<Comparison>,
    options: FitOptions,
}

impl<T: ItemKey> RankingState<T> {
    pub fn new(items: &[T]) -> Result<Self, RankingError> {
        Self::with_options(items, FitOptions::default())
    }

    pub fn with_options(items: &[T], options: FitOptions) -> Result<Self, RankingError> {
        Ok(RankingState {
            id_map: IdMap::from_items(items)?,
            comparisons: Vec::new(),
            options,
        })
    }

    /// Record that `winner` beat the other of `item_a` / `item_b`.
    pub fn add_comparison(&mut self, item_a: &T, item_b: &T, winner: &T) -> Result<(), RankingError> {
        let comparison = self.resolve(item_a, item_b, winner)?;
        self.comparisons.push(comparison);
        Ok(())
    }

    fn resolve(&self, item_a: &T, item_b: &T, winner: &T) -> Result<Comparison, RankingError> {
        if winner != item_a && winner != item_b {
            return Err(RankingError::InvalidWinner {
                item_a: item_a.to_string(),
                item_b: item_b.to_string(),
                winner: winner.to_string(),
            });
        }
        let idx_a = self.id_map.to_idx(item_a)?;
        let idx_b = self.id_map.to_idx(item_b)?;
        if idx_a == idx_b {
            return Err(RankingError::SelfComparison { item: item_a.to_string() });
        }

        Ok(if winner == item_a {
            Comparison { winner: idx_a, loser: idx_b }
        } else {
            Comparison { winner: idx_b, loser: idx_a }
        })
    }

    pub fn items(&self) -> &[T] {
        self.id_map.items()
    }

    pub fn num_items(&self) -> usize {
        self.id_map.len()
    }

    pub fn index_of(&self, item: &T) -> Result<usize, RankingError> {
        self.id_map.to_idx(item)
    }

    /// All recorded comparisons, oldest first.
    pub fn comparisons(&self) -> &[Comparison] {
        &self.comparisons
    }

    pub fn comparison_count(&self) -> usize {
        self.comparisons.len()
    }

    pub fn options(&self) -> FitOptions {
        self.options
    }

    /// Drop every recorded comparison. The item list is kept.
    pub fn clear(&mut self) {
        self.comparisons.clear();
    }

    /// Per-item wins and losses, in item-list order.
    pub fn win_loss_counts(&self) -> Vec<WinLoss> {
        let mut counts = vec![WinLoss::default(); self.num_items()];
        for c in &self.comparisons {
            counts[c.winner].wins += 1;
            counts[c.loser].losses += 1;
        }
        counts
    }

    /// `matrix[i][j]` = number of times item `i` beat item `j`.
    pub fn comparison_matrix(&self) -> Vec<Vec<usize>> {
        let n = self.num_items();
        let mut matrix = vec![vec![0; n]; n];
        for c in &self.comparisons {
            matrix[c.winner][c.loser] += 1;
        }
        matrix
    }

    pub fn density(&self) -> f64 {
        comparison_density(self.comparisons.len(), self.num_items())
    }

    /// Indices ordered by win rate, descending; ties keep item-list order.
    pub(crate) fn simple_ranking_indices(&self) -> Vec<usize> {
        let win_rates: Vec<f64> = self
            .win_loss_counts()
            .iter()
            .map(|wl| wl.win_rate_or(NEUTRAL_WIN_RATE))
            .collect();

        let mut order: Vec<usize> = (0..self.num_items()).collect();
        // Stable sort keeps original order among equal win rates.
        order.sort_by(|&a, &b| win_rates[b].total_cmp(&win_rates[a]));
        order
    }

    /// Items ordered by win rate, best first. Never fails.
    pub fn simple_ranking(&self) -> Vec<T> {
        self.id_map.indices_to_items(&self.simple_ranking_indices())
    }

    /// Run the Bradley-Terry fit on the current log.
    ///
    /// Returns strengths in item-list order, normalized to geometric mean 1.0.
    pub fn fit_strengths(&self) -> Result<Vec<f64>, FitError> {
        if self.comparisons.len() < MIN_COMPARISONS_FOR_FIT {
            return Err(FitError::InsufficientData {
                required: MIN_COMPARISONS_FOR_FIT,
                actual: self.comparisons.len(),
            });
        }

        let mut bt = BradleyTerry::new(
            self.num_items(),
            &self.comparisons,
            self.options.regularization_strength,
        );
        let iterations = bt.calculate_scores()?;
        debug!(
            iterations,
            comparisons = self.comparisons.len(),
            "Bradley-Terry fit converged"
        );
        Ok(bt.real_scores().to_vec())
    }

    /// Bradley-Terry ranking with confidence, or the win-rate fallback.
    ///
    /// Fewer than `MIN_COMPARISONS_FOR_FIT` comparisons, or any fit failure,
    /// yields `(simple_ranking(), 0.0, None)`.
    pub fn fitted_ranking(&self) -> FittedRanking<T> {
        match self.fit_strengths() {
            Ok(strengths) => {
                let mut order: Vec<usize> = (0..self.num_items()).collect();
                order.sort_by(|&a, &b| strengths[b].total_cmp(&strengths[a]));

                FittedRanking {
                    ranking: self.id_map.indices_to_items(&order),
                    confidence: confidence_from_density(self.density()),
                    strengths: Some(strengths),
                }
            }
            Err(e) => {
                debug!(error = %e, "Falling back to win-rate ranking");
                self.fallback_ranking()
            }
        }
    }

    fn fallback_ranking(&self) -> FittedRanking<T> {
        FittedRanking {
            ranking: self.simple_ranking(),
            confidence: 0.0,
            strengths: None,
        }
    }
}
