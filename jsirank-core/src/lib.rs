/// jsirank-core: Active-learning pairwise ranking engine.
///
/// An oracle answers "is `a` better than `b`?". An adaptive quicksort ("Just
/// Sort It") spends as few oracle calls as it can, every answer goes into a
/// comparison log, and a Bradley-Terry fit over that log yields strengths and
/// a confidence value. No IO, no threads of its own. Bring your own oracle.
///
/// Items are caller-provided keys (`String`, `&str`, integers, ...). The crate
/// maps them to array indices internally.
///
/// # Quick start
///
/// ```rust
/// use jsirank_core::{AdaptiveSort, RankingTracker};
///
/// let items = vec!["cello", "flute", "oboe"];
/// let tracker = RankingTracker::new(&items).unwrap();
///
/// // Any `FnMut(&T, &T) -> bool` is an oracle.
/// let loudness = |item: &&str| item.len();
/// let mut sorter = AdaptiveSort::new(|a: &&str, b: &&str| loudness(a) > loudness(b));
/// let sorted = sorter.sort(&items, &mut &tracker).unwrap();
///
/// assert_eq!(sorted.len(), 3);
/// let fitted = tracker.get_fitted_ranking();
/// println!("{:?} (confidence {:.2})", fitted.ranking, fitted.confidence);
/// ```

mod bradley_terry;
pub mod constants;
pub mod error;
pub mod fitness;
pub mod oracle;
pub mod population;
pub mod ranking_state;
pub mod sort;
pub mod tracker;
pub mod types;

// Re-export primary public API at crate root.
pub use error::RankingError;
pub use fitness::{fallback_fitness, min_max_strengths, softmax_strengths, FitnessNormalization};
pub use oracle::{CoinFlipOnError, ComparisonOracle, FallibleOracle};
pub use population::{
    assign_ids, find_artifact, Artifact, FitnessOrder, InvalidSolution, Partition, PopulationRanker, RankedPopulation, RankingInfo,
    ScoredSolution, ValidSolution,
};
pub use ranking_state::{FitOptions, RankingState};
pub use sort::{AdaptiveSort, PivotStrategy, RecordComparison};
pub use tracker::{CallbackId, RankingStatistics, RankingTracker, UpdateCallback};
pub use types::{Comparison, FittedRanking, ItemKey, WinLoss};
