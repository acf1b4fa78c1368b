/// Population ranking adapter: turns a batch of optimizer solutions plus their
/// rendered artifacts into one ranking run, and the result back into fitness.
///
/// Missing artifacts never fail a batch. Solutions without one are ranked
/// below every valid solution, and any error in the ranking run degrades the
/// whole population to a fixed fallback fitness.
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::constants::DEFAULT_PENALTY_FITNESS;
use crate::error::RankingError;
use crate::fitness::{fallback_fitness, FitnessNormalization};
use crate::oracle::ComparisonOracle;
use crate::ranking_state::{FitOptions, RankingState};
use crate::sort::{AdaptiveSort, PivotStrategy};

/// Something rendered for a solution that the oracle can compare.
pub trait Artifact {
    fn exists(&self) -> bool;
}

impl Artifact for Path {
    fn exists(&self) -> bool {
        self.is_file()
    }
}

impl Artifact for PathBuf {
    fn exists(&self) -> bool {
        self.as_path().is_file()
    }
}

impl<A: Artifact + ?Sized> Artifact for &A {
    fn exists(&self) -> bool {
        (**self).exists()
    }
}

/// `sol_000`, `sol_001`, ... by position.
pub fn assign_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("sol_{i:03}")).collect()
}

/// Resolve `id` to an existing artifact.
///
/// Tries an exact key, then a key that contains or is contained in `id`, then
/// a key containing the part of `id` after its last `_`. Keys are scanned in
/// sorted order so the first match is deterministic.
pub fn find_artifact<'a, A: Artifact>(id: &str, artifacts: &'a BTreeMap<String, A>) -> Option<&'a A> {
    if let Some(artifact) = artifacts.get(id) {
        return artifact.exists().then_some(artifact);
    }

    let fuzzy = artifacts
        .iter()
        .find(|(key, _)| key.contains(id) || id.contains(key.as_str()))
        .map(|(_, artifact)| artifact);
    if let Some(artifact) = fuzzy {
        return artifact.exists().then_some(artifact);
    }

    let suffix = id.rsplit('_').next().filter(|s| !s.is_empty() && *s != id)?;
    artifacts
        .iter()
        .find(|(key, _)| key.contains(suffix))
        .map(|(_, artifact)| artifact)
        .filter(|artifact| artifact.exists())
}

/// A solution that has an artifact and takes part in ranking.
#[derive(Debug, Clone)]
pub struct ValidSolution<S, A> {
    pub solution: S,
    pub id: String,
    pub artifact: A,
    /// Position in the population handed to `filter_valid`.
    pub index: usize,
}

/// A solution set aside because its artifact is missing.
#[derive(Debug, Clone)]
pub struct InvalidSolution<S> {
    pub solution: S,
    pub id: String,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct Partition<S, A> {
    pub valid: Vec<ValidSolution<S, A>>,
    pub invalid: Vec<InvalidSolution<S>>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoredSolution<S> {
    pub solution: S,
    pub id: String,
    pub fitness: f64,
    /// False for solutions reinserted with the penalty fitness.
    pub valid: bool,
    /// Position in the original population.
    pub index: usize,
}

/// Which order assigns ranks, and so fitness, to valid solutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum FitnessOrder {
    /// Bradley-Terry order when the fit succeeds, the sort order otherwise.
    #[default]
    Fitted,
    /// Always the sort order. The fit is only reported in `RankingInfo::bt_ranking`.
    SortOrder,
}

/// Summary of one ranking run.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankingInfo {
    /// Ids of valid solutions, best first, as reported by the fit.
    pub bt_ranking: Vec<String>,
    /// Ids as returned by the adaptive sort, best first.
    pub sort_order: Vec<String>,
    pub confidence: f64,
    /// `(id, strength)` in `bt_ranking` order. Empty when the fit fell back.
    pub strengths: Vec<(String, f64)>,
    pub comparisons_made: usize,
    pub valid_solutions: usize,
    pub total_solutions: usize,
    pub generation: usize,
    pub fallback: bool,
}

/// Scored population, best first, plus the run summary.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankedPopulation<S> {
    pub solutions: Vec<ScoredSolution<S>>,
    pub info: RankingInfo,
}

impl<S> RankedPopulation<S> {
    /// Fitness aligned with the original population order.
    pub fn fitness_in_input_order(&self) -> Vec<f64> {
        let mut fitness = vec![0.0; self.solutions.len()];
        for scored in &self.solutions {
            if let Some(slot) = fitness.get_mut(scored.index) {
                *slot = scored.fitness;
            }
        }
        fitness
    }
}

#[derive(Debug, Clone)]
pub struct PopulationRanker {
    normalization: FitnessNormalization,
    penalty_fitness: f64,
    pivot_strategy: PivotStrategy,
    fit_options: FitOptions,
    fitness_order: FitnessOrder,
    total_comparisons: usize,
    generation_count: usize,
}

impl Default for PopulationRanker {
    fn default() -> Self {
        Self::new(FitnessNormalization::default())
    }
}

impl PopulationRanker {
    pub fn new(normalization: FitnessNormalization) -> Self {
        PopulationRanker {
            normalization,
            penalty_fitness: DEFAULT_PENALTY_FITNESS,
            pivot_strategy: PivotStrategy::First,
            fit_options: FitOptions::default(),
            fitness_order: FitnessOrder::default(),
            total_comparisons: 0,
            generation_count: 0,
        }
    }

    pub fn with_penalty_fitness(mut self, penalty: f64) -> Self {
        self.penalty_fitness = penalty;
        self
    }

    pub fn with_pivot_strategy(mut self, pivot_strategy: PivotStrategy) -> Self {
        self.pivot_strategy = pivot_strategy;
        self
    }

    pub fn with_fit_options(mut self, fit_options: FitOptions) -> Self {
        self.fit_options = fit_options;
        self
    }

    pub fn with_fitness_order(mut self, fitness_order: FitnessOrder) -> Self {
        self.fitness_order = fitness_order;
        self
    }

    pub fn normalization(&self) -> FitnessNormalization {
        self.normalization
    }

    /// Oracle calls across every ranking run of this ranker.
    pub fn total_comparisons(&self) -> usize {
        self.total_comparisons
    }

    pub fn generation_count(&self) -> usize {
        self.generation_count
    }

    /// Split `solutions` by whether an existing artifact resolves for their id.
    pub fn filter_valid<S, A>(&self, solutions: Vec<S>, artifacts: &BTreeMap<String, A>) -> Partition<S, A>
    where
        A: Artifact + Clone,
    {
        let ids = assign_ids(solutions.len());
        let mut partition = Partition {
            valid: Vec::new(),
            invalid: Vec::new(),
        };

        for (index, (solution, id)) in solutions.into_iter().zip(ids).enumerate() {
            match find_artifact(&id, artifacts) {
                Some(artifact) => partition.valid.push(ValidSolution {
                    solution,
                    id,
                    artifact: artifact.clone(),
                    index,
                }),
                None => {
                    debug!(id = %id, "No artifact, setting solution aside");
                    partition.invalid.push(InvalidSolution { solution, id, index });
                }
            }
        }
        partition
    }

    /// Rank valid solutions with the oracle and map rank to fitness.
    ///
    /// Fewer than 2 valid solutions gives the fallback fitness in input order.
    /// With `FitnessOrder::Fitted` a successful Bradley-Terry fit decides the
    /// rank and the sort order is the fallback. `FitnessOrder::SortOrder`
    /// always ranks by the sort, as a plain JSI integration would.
    pub fn rank_and_score<S, A, O>(
        &mut self,
        valid: Vec<ValidSolution<S, A>>,
        oracle: &mut O,
    ) -> Result<RankedPopulation<S>, RankingError>
    where
        O: ComparisonOracle<A> + ?Sized,
    {
        if valid.len() < 2 {
            debug!(valid = valid.len(), "Too few valid solutions to rank");
            return Ok(self.fallback(valid.into_iter().map(|v| (v.solution, v.id, v.index, true)).collect()));
        }

        let ids: Vec<String> = valid.iter().map(|v| v.id.clone()).collect();
        let positions: HashMap<String, usize> = ids.iter().cloned().enumerate().map(|(i, id)| (id, i)).collect();
        let mut state = RankingState::with_options(&ids, self.fit_options)?;

        let sorted_ids = {
            let artifacts = &valid;
            let positions = &positions;
            let mut sorter = AdaptiveSort::with_pivot_strategy(
                |a: &String, b: &String| oracle.compare(&artifacts[positions[a]].artifact, &artifacts[positions[b]].artifact),
                self.pivot_strategy,
            );
            sorter.sort(&ids, &mut state)?
        };

        let comparisons_made = state.comparison_count();
        self.total_comparisons += comparisons_made;

        let fitted = state.fitted_ranking();
        let strengths = match &fitted.strengths {
            Some(values) => fitted
                .ranking
                .iter()
                .map(|id| (id.clone(), values[positions[id]]))
                .collect(),
            None => Vec::new(),
        };
        let order = match self.fitness_order {
            FitnessOrder::Fitted if fitted.is_fitted() => &fitted.ranking,
            _ => &sorted_ids,
        };
        let fitness = self.normalization.fitness_values(order.len());

        let mut slots: Vec<Option<ValidSolution<S, A>>> = valid.into_iter().map(Some).collect();
        let mut solutions = Vec::with_capacity(order.len());
        for (id, fitness) in order.iter().zip(fitness) {
            if let Some(v) = slots[positions[id]].take() {
                solutions.push(ScoredSolution {
                    solution: v.solution,
                    id: v.id,
                    fitness,
                    valid: true,
                    index: v.index,
                });
            }
        }

        let info = RankingInfo {
            bt_ranking: fitted.ranking.clone(),
            sort_order: sorted_ids.clone(),
            confidence: fitted.confidence,
            strengths,
            comparisons_made,
            valid_solutions: solutions.len(),
            total_solutions: solutions.len(),
            generation: self.generation_count,
            fallback: false,
        };
        Ok(RankedPopulation { solutions, info })
    }

    /// Append invalid solutions with a fitness strictly below every valid one.
    pub fn merge_with_invalid<S>(&self, mut ranked: RankedPopulation<S>, invalid: Vec<InvalidSolution<S>>) -> RankedPopulation<S> {
        let min_valid = ranked
            .solutions
            .iter()
            .filter(|s| s.valid)
            .map(|s| s.fitness)
            .fold(f64::INFINITY, f64::min);
        let penalty = if self.penalty_fitness < min_valid {
            self.penalty_fitness
        } else if min_valid > 0.0 {
            min_valid / 2.0
        } else {
            min_valid - DEFAULT_PENALTY_FITNESS
        };

        ranked.info.total_solutions += invalid.len();
        ranked
            .solutions
            .extend(invalid.into_iter().map(|inv| ScoredSolution {
                solution: inv.solution,
                id: inv.id,
                fitness: penalty,
                valid: false,
                index: inv.index,
            }));
        ranked
    }

    /// Full pipeline for one generation: filter, rank, merge.
    ///
    /// Never fails. Any error degrades the whole population to the fallback
    /// fitness in input order.
    pub fn evaluate_population<S, A, O>(
        &mut self,
        solutions: Vec<S>,
        artifacts: &BTreeMap<String, A>,
        oracle: &mut O,
    ) -> RankedPopulation<S>
    where
        S: Clone,
        A: Artifact + Clone,
        O: ComparisonOracle<A> + ?Sized,
    {
        self.generation_count += 1;
        let total = solutions.len();
        let backup = solutions.clone();

        let partition = self.filter_valid(solutions, artifacts);
        let valid_count = partition.valid.len();
        let mut has_artifact = vec![false; total];
        for v in &partition.valid {
            has_artifact[v.index] = true;
        }
        if valid_count < 2 {
            warn!(
                generation = self.generation_count,
                valid = valid_count,
                total,
                "Too few valid solutions, using fallback fitness"
            );
            return self.fallback_population(backup, &has_artifact);
        }

        match self.rank_and_score(partition.valid, oracle) {
            Ok(ranked) => {
                let merged = self.merge_with_invalid(ranked, partition.invalid);
                info!(
                    generation = self.generation_count,
                    valid = valid_count,
                    total,
                    comparisons = merged.info.comparisons_made,
                    confidence = merged.info.confidence,
                    "Population ranked"
                );
                merged
            }
            Err(e) => {
                warn!(generation = self.generation_count, error = %e, "Ranking failed, using fallback fitness");
                self.fallback_population(backup, &has_artifact)
            }
        }
    }

    /// Whole population in input order. `has_artifact[i]` marks solution `i` valid.
    fn fallback_population<S>(&self, solutions: Vec<S>, has_artifact: &[bool]) -> RankedPopulation<S> {
        let ids = assign_ids(solutions.len());
        let entries = solutions
            .into_iter()
            .zip(ids)
            .enumerate()
            .map(|(index, (solution, id))| (solution, id, index, has_artifact.get(index).copied().unwrap_or(false)))
            .collect();
        self.fallback(entries)
    }

    fn fallback<S>(&self, entries: Vec<(S, String, usize, bool)>) -> RankedPopulation<S> {
        let fitness = fallback_fitness(entries.len());
        let solutions: Vec<ScoredSolution<S>> = entries
            .into_iter()
            .zip(fitness)
            .map(|((solution, id, index, valid), fitness)| ScoredSolution {
                solution,
                id,
                fitness,
                valid,
                index,
            })
            .collect();
        let input_order: Vec<String> = solutions.iter().map(|s| s.id.clone()).collect();
        let info = RankingInfo {
            bt_ranking: input_order.clone(),
            sort_order: input_order,
            valid_solutions: solutions.iter().filter(|s| s.valid).count(),
            total_solutions: solutions.len(),
            generation: self.generation_count,
            fallback: true,
            ..RankingInfo::default()
        };
        RankedPopulation { solutions, info }
    }
}
