/// Thread-safe ranking façade with observer callbacks.
///
/// A single mutex guards the ranking state and the cached fit. Callbacks run
/// after the lock is released, so a callback may call back into the tracker.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::RankingError;
use crate::ranking_state::{FitOptions, RankingState};
use crate::sort::RecordComparison;
use crate::types::{FittedRanking, ItemKey, WinLoss};

/// A "ranking changed" listener.
#[derive(Clone)]
pub enum UpdateCallback {
    /// Called with no payload.
    Notify(Arc<dyn Fn() + Send + Sync>),
    /// Called with the comparison count after the change.
    WithCount(Arc<dyn Fn(usize) + Send + Sync>),
}

impl UpdateCallback {
    pub fn notify(f: impl Fn() + Send + Sync + 'static) -> Self {
        UpdateCallback::Notify(Arc::new(f))
    }

    pub fn with_count(f: impl Fn(usize) + Send + Sync + 'static) -> Self {
        UpdateCallback::WithCount(Arc::new(f))
    }

    fn invoke(&self, comparison_count: usize) {
        match self {
            UpdateCallback::Notify(f) => f(),
            UpdateCallback::WithCount(f) => f(comparison_count),
        }
    }
}

/// Handle returned by `add_update_callback`, used to remove the callback again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// Snapshot returned by `get_ranking_statistics()`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankingStatistics<T> {
    pub comparison_count: usize,
    pub num_items: usize,
    pub model_fitted: bool,
    pub ranking_confidence: f64,
    pub density: f64,
    /// Best item of the current ranking.
    pub top_item: Option<T>,
    /// Current ranking, best first.
    pub ranking: Vec<T>,
    /// Bradley-Terry strengths, best first. `None` until a fit succeeds.
    pub strengths: Option<Vec<(T, f64)>>,
    /// Wins and losses per item, in item-list order.
    pub records: Vec<(T, WinLoss)>,
}

struct TrackerState<T> {
    ranking: RankingState<T>,
    cached_fit: Option<FittedRanking<T>>,
}

impl<T: ItemKey> TrackerState<T> {
    fn fit(&mut self) -> &FittedRanking<T> {
        let ranking = &self.ranking;
        self.cached_fit.get_or_insert_with(|| ranking.fitted_ranking())
    }
}

struct Listeners {
    next_id: u64,
    callbacks: Vec<(CallbackId, UpdateCallback)>,
}

pub struct RankingTracker<T> {
    state: Mutex<TrackerState<T>>,
    listeners: Mutex<Listeners>,
}

/// Lock a mutex, recovering the guard if a panicking thread poisoned it.
/// The guarded data is only mutated by single appends and clears, so it is
/// consistent even after a poisoning panic.
fn lock<X>(mutex: &Mutex<X>) -> MutexGuard<'_, X> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: ItemKey> RankingTracker<T> {
    pub fn new(items: &[T]) -> Result<Self, RankingError> {
        Self::with_options(items, FitOptions::default())
    }

    pub fn with_options(items: &[T], options: FitOptions) -> Result<Self, RankingError> {
        Ok(RankingTracker {
            state: Mutex::new(TrackerState {
                ranking: RankingState::with_options(items, options)?,
                cached_fit: None,
            }),
            listeners: Mutex::new(Listeners {
                next_id: 0,
                callbacks: Vec::new(),
            }),
        })
    }

    pub fn items(&self) -> Vec<T> {
        lock(&self.state).ranking.items().to_vec()
    }

    /// Record a comparison, then notify every registered callback.
    pub fn add_comparison(&self, item_a: &T, item_b: &T, winner: &T) -> Result<(), RankingError> {
        let count = {
            let mut state = lock(&self.state);
            state.ranking.add_comparison(item_a, item_b, winner)?;
            state.cached_fit = None;
            state.ranking.comparison_count()
        };
        self.notify(count);
        Ok(())
    }

    /// Clear the comparison log and every derived value.
    pub fn reset(&self) {
        {
            let mut state = lock(&self.state);
            state.ranking.clear();
            state.cached_fit = None;
        }
        debug!("Ranking tracker reset");
        self.notify(0);
    }

    fn notify(&self, comparison_count: usize) {
        // Snapshot so callbacks run without either lock held.
        let callbacks: Vec<UpdateCallback> = lock(&self.listeners)
            .callbacks
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in &callbacks {
            cb.invoke(comparison_count);
        }
    }

    pub fn add_update_callback(&self, callback: UpdateCallback) -> CallbackId {
        let mut listeners = lock(&self.listeners);
        let id = CallbackId(listeners.next_id);
        listeners.next_id += 1;
        listeners.callbacks.push((id, callback));
        id
    }

    /// Remove a callback. Returns `false` (and does nothing) if it was not registered.
    pub fn remove_update_callback(&self, id: CallbackId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.callbacks.len();
        listeners.callbacks.retain(|(cb_id, _)| *cb_id != id);
        listeners.callbacks.len() != before
    }

    pub fn get_comparison_count(&self) -> usize {
        lock(&self.state).ranking.comparison_count()
    }

    /// Current ranking, best first: Bradley-Terry when fitted, win rate otherwise.
    pub fn get_current_ranking(&self) -> Vec<T> {
        lock(&self.state).fit().ranking.clone()
    }

    /// Full fit result (ranking, confidence, strengths).
    pub fn get_fitted_ranking(&self) -> FittedRanking<T> {
        lock(&self.state).fit().clone()
    }

    /// `(P(a beats b), P(b beats a))`, always summing to 1.0.
    ///
    /// Uses fitted Bradley-Terry strengths when available, otherwise
    /// Laplace-smoothed win/loss ratios `(wins + 1) / (losses + 1)`.
    pub fn get_win_probabilities(&self, item_a: &T, item_b: &T) -> Result<(f64, f64), RankingError> {
        let mut state = lock(&self.state);
        let idx_a = state.ranking.index_of(item_a)?;
        let idx_b = state.ranking.index_of(item_b)?;
        if idx_a == idx_b {
            return Ok((0.5, 0.5));
        }

        let fitted = state.fit().strengths.as_ref().map(|s| (s[idx_a], s[idx_b]));
        let (s_a, s_b) = match fitted {
            Some(pair) => pair,
            None => {
                let records = state.ranking.win_loss_counts();
                (smoothed_strength(records[idx_a]), smoothed_strength(records[idx_b]))
            }
        };

        let p_a = s_a / (s_a + s_b);
        Ok((p_a, 1.0 - p_a))
    }

    /// `matrix[i][j]` = times item `i` beat item `j`, in item-list order.
    pub fn get_comparison_matrix(&self) -> Vec<Vec<usize>> {
        lock(&self.state).ranking.comparison_matrix()
    }

    pub fn get_ranking_statistics(&self) -> RankingStatistics<T> {
        let mut state = lock(&self.state);
        let fit = state.fit().clone();
        let ranking_state = &state.ranking;
        let items = ranking_state.items();

        let strengths = fit.strengths.as_ref().map(|strengths| {
            let mut pairs: Vec<(T, f64)> = items.iter().cloned().zip(strengths.iter().copied()).collect();
            pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
            pairs
        });

        RankingStatistics {
            comparison_count: ranking_state.comparison_count(),
            num_items: ranking_state.num_items(),
            model_fitted: fit.is_fitted(),
            ranking_confidence: fit.confidence,
            density: ranking_state.density(),
            top_item: fit.ranking.first().cloned(),
            strengths,
            records: items.iter().cloned().zip(ranking_state.win_loss_counts()).collect(),
            ranking: fit.ranking,
        }
    }
}

fn smoothed_strength(record: WinLoss) -> f64 {
    (record.wins as f64 + 1.0) / (record.losses as f64 + 1.0)
}

/// A shared tracker is a valid sort sink: each record takes the lock once.
impl<T: ItemKey> RecordComparison<T> for &RankingTracker<T> {
    fn record_comparison(&mut self, item_a: &T, item_b: &T, winner: &T) -> Result<(), RankingError> {
        self.add_comparison(item_a, item_b, winner)
    }
}
