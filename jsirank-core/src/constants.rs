/// Minimum number of recorded comparisons before a Bradley-Terry fit is attempted.
/// Below this the comparison graph cannot identify relative strengths, so the
/// simple win-rate ranking is returned instead.
pub const MIN_COMPARISONS_FOR_FIT: usize = 3;

/// Upper bound on reported confidence. No finite noisy sample earns certainty.
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Confidence grows as `CONFIDENCE_DENSITY_SCALE * density` until it hits `MAX_CONFIDENCE`.
pub const CONFIDENCE_DENSITY_SCALE: f64 = 2.0;

/// Win rate assumed for an item that has not been compared yet.
pub const NEUTRAL_WIN_RATE: f64 = 0.5;

/// Iteration cap for the MM fitter. Reaching it without convergence is a fit failure.
/// MM contracts slowly on long chains of comparisons, so the cap is generous.
pub const MAX_FIT_ITERATIONS: usize = 100_000;

/// Convergence threshold on the log-likelihood change between iterations.
pub const LOG_LIKELIHOOD_TOLERANCE: f64 = 1e-10;

/// Convergence threshold on the largest log-strength change between iterations.
/// The fit has converged only when both thresholds hold.
pub const LOG_STRENGTH_TOLERANCE: f64 = 1e-9;

/// Fitness step used by the fallback ranking: item `i` gets `1.0 - i * step`.
pub const FALLBACK_FITNESS_STEP: f64 = 0.01;

/// Default fitness for solutions that could not be ranked (missing artifact).
pub const DEFAULT_PENALTY_FITNESS: f64 = 0.01;

/// Decay rate of the exponential rank-to-fitness mapping: `exp(-rate * rank)`.
pub const EXPONENTIAL_FITNESS_DECAY: f64 = 0.5;

/// Total fitness drop across the ranked list for the linear mapping (1.0 down to 0.1).
pub const LINEAR_FITNESS_SPAN: f64 = 0.9;
