use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::error::RankingError;

/// Anything usable as a ranked item: an opaque, hashable identifier.
///
/// Blanket-implemented, so `String`, `&str`, integers and small newtypes all qualify.
pub trait ItemKey: Clone + Eq + Hash + fmt::Display {}

impl<T: Clone + Eq + Hash + fmt::Display> ItemKey for T {}

/// One recorded comparison, stored by index into the session's item list.
///
/// Invariant: `winner != loser` and both are valid indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Comparison {
    pub winner: usize,
    pub loser: usize,
}

/// Wins and losses of one item across the comparison log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WinLoss {
    pub wins: usize,
    pub losses: usize,
}

impl WinLoss {
    pub fn total(&self) -> usize {
        self.wins + self.losses
    }

    /// `wins / (wins + losses)`, or `neutral` when the item was never compared.
    pub fn win_rate_or(&self, neutral: f64) -> f64 {
        match self.total() {
            0 => neutral,
            total => self.wins as f64 / total as f64,
        }
    }
}

/// Result of `RankingState::fitted_ranking()`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FittedRanking<T> {
    /// All items, best first.
    pub ranking: Vec<T>,
    /// In `[0, MAX_CONFIDENCE]`. Exactly 0.0 when the fit fell back to win rates.
    pub confidence: f64,
    /// Bradley-Terry strengths in item-list order (geometric mean 1.0).
    /// `None` when no fit succeeded.
    pub strengths: Option<Vec<f64>>,
}

impl<T> FittedRanking<T> {
    pub fn is_fitted(&self) -> bool {
        self.strengths.is_some()
    }
}

/// Maps between caller-provided item keys and internal 0..N indices.
#[derive(Debug, Clone)]
pub(crate) struct IdMap<T> {
    items: Vec<T>,
    item_to_idx: HashMap<T, usize>,
}

impl<T: ItemKey> IdMap<T> {
    pub fn from_items(items: &[T]) -> Result<Self, RankingError> {
        let mut item_to_idx = HashMap::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            if item_to_idx.insert(item.clone(), idx).is_some() {
                return Err(RankingError::DuplicateItem { item: item.to_string() });
            }
        }
        Ok(IdMap {
            items: items.to_vec(),
            item_to_idx,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn to_idx(&self, item: &T) -> Result<usize, RankingError> {
        self.item_to_idx
            .get(item)
            .copied()
            .ok_or_else(|| RankingError::UnknownItem { item: item.to_string() })
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn indices_to_items(&self, indices: &[usize]) -> Vec<T> {
        indices.iter().map(|&i| self.items[i].clone()).collect()
    }
}
