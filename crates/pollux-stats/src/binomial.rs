//! Binomial distribution helpers and single sampling plans.

use std::fmt::{self, Display};

use statrs::distribution::{Binomial, DiscreteCDF};
use tracing::debug;

/// `P(X <= k)` for `X ~ Binomial(n, p)`.
///
/// # Panics
///
/// Panics if `p` is not in `[0, 1]`.
pub fn binomial_cdf(k: i64, n: u64, p: f64) -> f64 {
    assert!((0.0..=1.0).contains(&p), "probability must be in [0, 1], got {p}");
    if k < 0 {
        return 0.0;
    }
    let k = k as u64;
    if k >= n {
        return 1.0;
    }
    Binomial::new(p, n).map_or(f64::NAN, |dist| dist.cdf(k))
}

/// Inverse binomial CDF: the smallest `x` with `P(X <= x) >= y` for
/// `X ~ Binomial(n, p)`.
///
/// # Panics
///
/// Panics if `p` is not in `[0, 1]`.
pub fn binoinv(y: f64, n: u64, p: f64) -> i64 {
    assert!((0.0..=1.0).contains(&p), "probability must be in [0, 1], got {p}");
    // All mass sits on a single point at the degenerate probabilities.
    if p == 0.0 || y <= 0.0 {
        return 0;
    }
    if p == 1.0 {
        return n as i64;
    }

    let (mut lo, mut hi) = (0u64, n);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if binomial_cdf(mid as i64, n, p) >= y {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo as i64
}

/// A single sampling plan `(n, c)`: draw `n` observations and accept iff
/// more than `c` are positive.
///
/// The plan guarantees that a source with `p >= theta0` is rejected with
/// probability at most `alpha` and a source with `p <= theta1` is accepted
/// with probability at most `beta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleSamplingPlan {
    n: u64,
    c: i64,
}

impl SingleSamplingPlan {
    /// Upper bound on the plan size explored by [`SingleSamplingPlan::create`].
    const MAX_SIZE: u64 = 1 << 40;

    /// Finds the smallest plan for the indifference region `(theta1, theta0)`.
    ///
    /// # Panics
    ///
    /// Panics unless `0 <= theta1 < theta0 <= 1` and `alpha`, `beta` are in
    /// `(0, 1)`.
    pub fn create(theta0: f64, theta1: f64, alpha: f64, beta: f64) -> Self {
        assert!(
            0.0 <= theta1 && theta1 < theta0 && theta0 <= 1.0,
            "single sampling needs 0 <= theta1 < theta0 <= 1, got ({theta0}, {theta1})"
        );
        assert!(alpha > 0.0 && alpha < 1.0 && beta > 0.0 && beta < 1.0);

        let acceptance = |n: u64| -> Option<i64> {
            let c = binoinv(1.0 - beta, n, theta1);
            (c <= binoinv(alpha, n, theta0) - 1).then_some(c)
        };

        let mut hi = 1u64;
        while acceptance(hi).is_none() {
            assert!(hi < Self::MAX_SIZE, "no single sampling plan below {hi}");
            hi *= 2;
        }

        let mut lo = hi / 2 + 1;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if acceptance(mid).is_some() {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }

        let c = acceptance(hi).unwrap_or(0);
        debug!(theta0, theta1, alpha, beta, n = hi, c, "single sampling plan");
        Self { n: hi, c }
    }

    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn c(&self) -> i64 {
        self.c
    }
}

impl Display for SingleSamplingPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={} c={}", self.n, self.c)
    }
}
