/// Comparison oracles: the only capability the ranking engine consumes.
///
/// Concrete oracles (simulated, human, audio-based, LLM-based) live with the
/// caller. The engine only needs "is `a` preferred over `b`?".
use std::fmt;
use std::marker::PhantomData;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

/// Answers whether `item_a` is preferred over `item_b`.
///
/// May be stochastic; takes `&mut self` so implementations can own an RNG or
/// count calls.
pub trait ComparisonOracle<T: ?Sized> {
    fn compare(&mut self, item_a: &T, item_b: &T) -> bool;
}

impl<T: ?Sized, F> ComparisonOracle<T> for F
where
    F: FnMut(&T, &T) -> bool,
{
    fn compare(&mut self, item_a: &T, item_b: &T) -> bool {
        self(item_a, item_b)
    }
}

/// An oracle whose comparisons can fail (timeouts, unreadable artifacts, bad responses).
pub trait FallibleOracle<T: ?Sized> {
    type Error: fmt::Display;

    fn try_compare(&mut self, item_a: &T, item_b: &T) -> Result<bool, Self::Error>;
}

/// Adapts a `FallibleOracle` by treating every failure as an unbiased coin flip.
///
/// The flipped decision is returned like any other, so it gets recorded
/// normally by the sort.
pub struct CoinFlipOnError<O, T: ?Sized> {
    inner: O,
    rng: StdRng,
    failures: usize,
    _item: PhantomData<fn(&T)>,
}

impl<O, T: ?Sized> CoinFlipOnError<O, T> {
    pub fn new(inner: O) -> Self {
        Self::with_rng(inner, StdRng::from_rng(&mut rand::rng()))
    }

    pub fn seeded(inner: O, seed: u64) -> Self {
        Self::with_rng(inner, StdRng::seed_from_u64(seed))
    }

    fn with_rng(inner: O, rng: StdRng) -> Self {
        CoinFlipOnError {
            inner,
            rng,
            failures: 0,
            _item: PhantomData,
        }
    }

    /// Number of comparisons that were decided by coin flip.
    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn into_inner(self) -> O {
        self.inner
    }
}

impl<O, T> ComparisonOracle<T> for CoinFlipOnError<O, T>
where
    O: FallibleOracle<T>,
    T: ?Sized,
{
    fn compare(&mut self, item_a: &T, item_b: &T) -> bool {
        match self.inner.try_compare(item_a, item_b) {
            Ok(preferred) => preferred,
            Err(e) => {
                self.failures += 1;
                warn!(error = %e, "Oracle comparison failed, deciding by coin flip");
                self.rng.random::<bool>()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlakyOracle {
        calls: usize,
    }

    impl FallibleOracle<u32> for FlakyOracle {
        type Error = String;

        fn try_compare(&mut self, a: &u32, b: &u32) -> Result<bool, String> {
            self.calls += 1;
            if self.calls % 2 == 0 {
                Err(format!("call {} failed", self.calls))
            } else {
                Ok(a > b)
            }
        }
    }

    #[test]
    fn test_closure_is_an_oracle() {
        let mut calls = 0;
        let mut oracle = |a: &i32, b: &i32| {
            calls += 1;
            a > b
        };
        assert!(oracle.compare(&3, &1));
        assert!(!ComparisonOracle::compare(&mut oracle, &1, &3));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_coin_flip_on_error_counts_failures() {
        let mut oracle: CoinFlipOnError<_, u32> = CoinFlipOnError::seeded(FlakyOracle { calls: 0 }, 42);
        for _ in 0..10 {
            oracle.compare(&5, &1);
        }
        assert_eq!(oracle.failures(), 5);
        assert_eq!(oracle.into_inner().calls, 10);
    }

    #[test]
    fn test_coin_flip_passes_through_successes() {
        let mut oracle: CoinFlipOnError<_, u32> = CoinFlipOnError::seeded(FlakyOracle { calls: 0 }, 1);
        // First call succeeds.
        assert!(oracle.compare(&5, &1));
        assert_eq!(oracle.failures(), 0);
    }

    #[test]
    fn test_coin_flip_is_roughly_fair() {
        struct AlwaysFails;
        impl FallibleOracle<u8> for AlwaysFails {
            type Error = &'static str;
            fn try_compare(&mut self, _: &u8, _: &u8) -> Result<bool, Self::Error> {
                Err("unavailable")
            }
        }

        let mut oracle: CoinFlipOnError<_, u8> = CoinFlipOnError::seeded(AlwaysFails, 9);
        let wins = (0..1000).filter(|_| oracle.compare(&0, &1)).count();
        assert!((400..=600).contains(&wins), "coin flip won {wins}/1000");
    }
}
