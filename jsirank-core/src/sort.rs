/// "Just Sort It" (JSI): quicksort where every pivot decision comes from the oracle.
///
/// Each oracle call is recorded exactly once into a comparison sink before the
/// partitions are sorted, so the same log can later feed a Bradley-Terry fit.
/// With a noisy oracle the output is a best-effort order, not a guaranteed
/// transitive one.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::error::RankingError;
use crate::oracle::ComparisonOracle;
use crate::ranking_state::RankingState;
use crate::types::ItemKey;

/// Destination for comparisons issued by the sort.
pub trait RecordComparison<T> {
    fn record_comparison(&mut self, item_a: &T, item_b: &T, winner: &T) -> Result<(), RankingError>;
}

impl<T: ItemKey> RecordComparison<T> for RankingState<T> {
    fn record_comparison(&mut self, item_a: &T, item_b: &T, winner: &T) -> Result<(), RankingError> {
        self.add_comparison(item_a, item_b, winner)
    }
}

/// How the pivot of each partition is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum PivotStrategy {
    /// Always the partition's first element. Deterministic, but O(n²) oracle
    /// calls when the input is already ordered.
    #[default]
    First,
    /// Uniformly random element of the partition.
    Random { seed: Option<u64> },
}

pub struct AdaptiveSort<O> {
    oracle: O,
    pivot_strategy: PivotStrategy,
    rng: Option<StdRng>,
    comparison_count: usize,
}

impl<O> AdaptiveSort<O> {
    pub fn new(oracle: O) -> Self {
        Self::with_pivot_strategy(oracle, PivotStrategy::First)
    }

    pub fn with_pivot_strategy(oracle: O, pivot_strategy: PivotStrategy) -> Self {
        let rng = match pivot_strategy {
            PivotStrategy::First => None,
            PivotStrategy::Random { seed: Some(seed) } => Some(StdRng::seed_from_u64(seed)),
            PivotStrategy::Random { seed: None } => Some(StdRng::from_rng(&mut rand::rng())),
        };
        AdaptiveSort {
            oracle,
            pivot_strategy,
            rng,
            comparison_count: 0,
        }
    }

    /// Oracle calls made across every `sort` call on this instance.
    pub fn comparison_count(&self) -> usize {
        self.comparison_count
    }

    pub fn pivot_strategy(&self) -> PivotStrategy {
        self.pivot_strategy
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn into_oracle(self) -> O {
        self.oracle
    }

    fn pick_pivot(&mut self, len: usize) -> usize {
        match self.rng.as_mut() {
            Some(rng) => rng.random_range(0..len),
            None => 0,
        }
    }

    /// Sort `items` best first, recording every comparison into `sink`.
    ///
    /// `oracle.compare(item, pivot) == true` means `item` beats the pivot.
    /// Fails only if the sink rejects a comparison (e.g. an item it does not track).
    pub fn sort<T, S>(&mut self, items: &[T], sink: &mut S) -> Result<Vec<T>, RankingError>
    where
        T: ItemKey,
        O: ComparisonOracle<T>,
        S: RecordComparison<T> + ?Sized,
    {
        let before = self.comparison_count;
        let sorted = self.sort_partition(items.to_vec(), sink, 0)?;
        debug!(
            items = items.len(),
            comparisons = self.comparison_count - before,
            "Adaptive sort finished"
        );
        Ok(sorted)
    }

    fn sort_partition<T, S>(&mut self, mut items: Vec<T>, sink: &mut S, depth: usize) -> Result<Vec<T>, RankingError>
    where
        T: ItemKey,
        O: ComparisonOracle<T>,
        S: RecordComparison<T> + ?Sized,
    {
        if items.len() <= 1 {
            return Ok(items);
        }

        let pivot_idx = self.pick_pivot(items.len());
        let pivot = items.remove(pivot_idx);
        trace!(depth, size = items.len() + 1, pivot = %pivot, "Partitioning");

        let mut better = Vec::new();
        let mut worse = Vec::new();

        for item in items {
            let item_wins = self.oracle.compare(&item, &pivot);
            self.comparison_count += 1;

            let winner = if item_wins { &item } else { &pivot };
            sink.record_comparison(&item, &pivot, winner)?;
            trace!(item = %item, pivot = %pivot, winner = %winner, "Comparison recorded");

            if item_wins {
                better.push(item);
            } else {
                worse.push(item);
            }
        }

        let mut sorted = self.sort_partition(better, sink, depth + 1)?;
        sorted.push(pivot);
        sorted.extend(self.sort_partition(worse, sink, depth + 1)?);
        Ok(sorted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn strengths() -> HashMap<&'static str, f64> {
        HashMap::from([("A", 4.0), ("B", 3.0), ("C", 2.0), ("D", 1.0)])
    }

    fn consistent_oracle(strengths: HashMap<&'static str, f64>) -> impl FnMut(&&'static str, &&'static str) -> bool {
        move |a: &&'static str, b: &&'static str| strengths[a] > strengths[b]
    }

    #[test]
    fn test_consistent_oracle_exact_order() {
        let items = ["A", "B", "C", "D"];
        let mut state = RankingState::new(&items).unwrap();
        let mut sorter = AdaptiveSort::new(consistent_oracle(strengths()));

        let sorted = sorter.sort(&items, &mut state).unwrap();

        assert_eq!(sorted, vec!["A", "B", "C", "D"]);
        let n = items.len();
        assert!((n - 1..=n * (n - 1) / 2).contains(&state.comparison_count()));
        assert_eq!(sorter.comparison_count(), state.comparison_count());
    }

    #[test]
    fn test_shuffled_inputs_sort_exactly() {
        let mut sorter = AdaptiveSort::new(consistent_oracle(strengths()));
        for items in [["D", "C", "B", "A"], ["B", "D", "A", "C"], ["C", "A", "D", "B"]] {
            let mut state = RankingState::new(&items).unwrap();
            assert_eq!(sorter.sort(&items, &mut state).unwrap(), vec!["A", "B", "C", "D"]);
        }
    }

    #[test]
    fn test_first_pivot_worst_case_on_sorted_input() {
        // Already best-first: every pivot beats everything left, so n(n-1)/2 calls.
        let items = ["A", "B", "C", "D"];
        let mut state = RankingState::new(&items).unwrap();
        let mut sorter = AdaptiveSort::new(consistent_oracle(strengths()));
        sorter.sort(&items, &mut state).unwrap();
        assert_eq!(state.comparison_count(), 6);
    }

    #[test]
    fn test_trivial_inputs() {
        let mut calls = 0;
        let mut sorter = AdaptiveSort::new(|_: &u8, _: &u8| {
            calls += 1;
            true
        });
        let mut state = RankingState::new(&[1u8]).unwrap();
        assert_eq!(sorter.sort(&[], &mut state).unwrap(), Vec::<u8>::new());
        assert_eq!(sorter.sort(&[1], &mut state).unwrap(), vec![1]);
        drop(sorter);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_every_comparison_recorded_once_with_correct_winner() {
        let items = ["B", "D", "A", "C"];
        let mut state = RankingState::new(&items).unwrap();
        let mut sorter = AdaptiveSort::new(consistent_oracle(strengths()));
        sorter.sort(&items, &mut state).unwrap();

        let s = strengths();
        for c in state.comparisons() {
            let (w, l) = (state.items()[c.winner], state.items()[c.loser]);
            assert!(s[w] > s[l], "{w} recorded as beating {l}");
        }
        let mut pairs: Vec<(usize, usize)> = state
            .comparisons()
            .iter()
            .map(|c| (c.winner.min(c.loser), c.winner.max(c.loser)))
            .collect();
        let total = pairs.len();
        pairs.sort();
        pairs.dedup();
        assert_eq!(pairs.len(), total, "a pair was compared twice");
    }

    #[test]
    fn test_noisy_oracle_output_is_permutation() {
        let items: Vec<String> = (0..25).map(|i| format!("item_{i}")).collect();
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = RankingState::new(&items).unwrap();
        let mut sorter = AdaptiveSort::new(move |_: &String, _: &String| rng.random::<bool>());

        let mut sorted = sorter.sort(&items, &mut state).unwrap();
        assert_eq!(sorted.len(), items.len());
        sorted.sort();
        let mut expected = items.clone();
        expected.sort();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn test_random_pivot_is_reproducible_and_exact() {
        let items = ["A", "B", "C", "D"];
        let run = || {
            let mut state = RankingState::new(&items).unwrap();
            let mut sorter = AdaptiveSort::with_pivot_strategy(
                consistent_oracle(strengths()),
                PivotStrategy::Random { seed: Some(11) },
            );
            let sorted = sorter.sort(&items, &mut state).unwrap();
            (sorted, state.comparisons().to_vec())
        };

        let (first, log_first) = run();
        let (second, log_second) = run();
        assert_eq!(first, vec!["A", "B", "C", "D"]);
        assert_eq!(first, second);
        assert_eq!(log_first, log_second);
    }

    #[test]
    fn test_sink_rejection_aborts_sort() {
        let mut state = RankingState::new(&["A", "B"]).unwrap();
        let mut sorter = AdaptiveSort::new(consistent_oracle(strengths()));
        let err = sorter.sort(&["A", "C"], &mut state).unwrap_err();
        assert!(matches!(err, RankingError::UnknownItem { .. }));
    }

    #[test]
    fn test_sorted_log_feeds_fit() {
        // A noisy-but-informative oracle on 8 items gives a fit that puts the
        // strongest item near the top.
        let items: Vec<u32> = (1..=8).collect();
        let mut state = RankingState::new(&items).unwrap();
        let mut rng = StdRng::seed_from_u64(21);
        let mut sorter = AdaptiveSort::new(move |a: &u32, b: &u32| {
            let p = *a as f64 / (*a + *b) as f64;
            rng.random::<f64>() < p
        });

        let sorted = sorter.sort(&items, &mut state).unwrap();
        assert_eq!(sorted.len(), 8);
        let fitted = state.fitted_ranking();
        assert_eq!(fitted.ranking.len(), 8);
        assert!(fitted.confidence <= crate::constants::MAX_CONFIDENCE);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_pivot_strategy_serde_names() {
        assert_eq!(serde_json::to_string(&PivotStrategy::First).unwrap(), r#""first""#);
        let random: PivotStrategy = serde_json::from_str(r#"{"random":{"seed":5}}"#).unwrap();
        assert_eq!(random, PivotStrategy::Random { seed: Some(5) });
    }
}
