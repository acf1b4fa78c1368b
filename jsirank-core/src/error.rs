/// Error types for the ranking engine.
use thiserror::Error;

/// Errors surfaced to callers of the ranking API.
///
/// These are programming errors (bad input), not runtime conditions: sparse
/// data and numerical trouble degrade to a fallback ranking instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RankingError {
    /// The declared winner is neither of the two compared items.
    #[error("winner '{winner}' must be either '{item_a}' or '{item_b}'")]
    InvalidWinner {
        item_a: String,
        item_b: String,
        winner: String,
    },

    /// An item that is not part of the session was referenced.
    #[error("unknown item '{item}'")]
    UnknownItem { item: String },

    /// An item was compared against itself.
    #[error("cannot compare item '{item}' with itself")]
    SelfComparison { item: String },

    /// The same item appears twice in the session's item list.
    #[error("duplicate item '{item}'")]
    DuplicateItem { item: String },
}

/// Reasons a Bradley-Terry fit can fail. Never escapes the ranking state:
/// every variant is absorbed into the win-rate fallback.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("need at least {required} comparisons, have {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("need at least 2 items, have {count}")]
    TooFewItems { count: usize },

    #[error("comparison graph is disconnected ({components} components)")]
    Disconnected { components: usize },

    /// An item never lost (strength diverges) or never won (strength collapses).
    #[error("item at index {index} has {wins} wins and {losses} losses")]
    Degenerate {
        index: usize,
        wins: usize,
        losses: usize,
    },

    /// Some group of items never lost to the items outside it.
    #[error("comparison graph is not strongly connected")]
    Dominated,

    #[error("no convergence after {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("non-finite strength at index {index}")]
    NonFinite { index: usize },
}
