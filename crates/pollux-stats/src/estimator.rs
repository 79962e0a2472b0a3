//! Fixed-width interval estimation.

use std::fmt::{self, Display};

use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::{BernoulliTester, Observation, Sample};

/// Okamoto (Chernoff–Hoeffding) sample size: the number of Bernoulli
/// observations after which the sample mean is within `delta` of the true
/// mean with probability at least `1 - alpha`.
///
/// # Panics
///
/// Panics unless `delta > 0` and `alpha` is in `(0, 1)`.
pub fn chernoff_sample_size(delta: f64, alpha: f64) -> u64 {
    assert!(delta > 0.0, "delta must be positive, got {delta}");
    assert!(alpha > 0.0 && alpha < 1.0, "alpha must be in (0, 1), got {alpha}");
    ((2.0 / alpha).ln() / (2.0 * delta * delta)).ceil() as u64
}

/// Chow–Robbins sequential estimator.
///
/// Stops once the Student-t interval of half-width `delta` around the
/// running mean has coverage at least `1 - alpha`:
/// `1/n + s^2 <= n * delta^2 / a^2`, where `a` is the `1 - alpha/2`
/// quantile with `n - 1` degrees of freedom. At least two observations are
/// required before the rule is evaluated.
#[derive(Debug, Clone)]
pub struct SequentialEstimator {
    delta: f64,
    alpha: f64,
    sample: Sample,
    state: f64,
    bound: f64,
    done: bool,
}

impl SequentialEstimator {
    /// # Panics
    ///
    /// Panics unless `delta > 0` and `alpha` is in `(0, 1)`.
    pub fn new(delta: f64, alpha: f64) -> Self {
        assert!(delta > 0.0, "delta must be positive, got {delta}");
        assert!(alpha > 0.0 && alpha < 1.0, "alpha must be in (0, 1), got {alpha}");
        Self {
            delta,
            alpha,
            sample: Sample::new(),
            state: f64::INFINITY,
            bound: 0.0,
            done: false,
        }
    }

    pub fn add_observation<T: Observation>(&mut self, observation: T) {
        self.sample.add_observation(observation);
        self.update();
    }

    pub fn set_sample(&mut self, sample: Sample) {
        self.sample = sample;
        self.state = f64::INFINITY;
        self.bound = 0.0;
        self.done = false;
        self.update();
    }

    pub fn sample(&self) -> &Sample {
        &self.sample
    }

    pub fn done(&self) -> bool {
        self.done
    }

    /// The point estimate.
    pub fn mean(&self) -> f64 {
        self.sample.mean()
    }

    /// Half-width of the confidence interval around [`Self::mean`].
    pub fn half_width(&self) -> f64 {
        self.delta
    }

    fn update(&mut self) {
        if self.done || self.sample.count() < 2 {
            return;
        }
        let n = self.sample.count() as f64;
        let a = StudentsT::new(0.0, 1.0, n - 1.0)
            .map_or(f64::INFINITY, |t| t.inverse_cdf(1.0 - 0.5 * self.alpha));
        self.state = 1.0 / n + self.sample.sample_variance();
        self.bound = n * self.delta * self.delta / (a * a);
        self.done = self.state <= self.bound;
    }
}

impl Display for SequentialEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chow-robbins delta={} alpha={} count={} mean={} state={} bound={} done={}",
            self.delta,
            self.alpha,
            self.sample.count(),
            self.sample.mean(),
            self.state,
            self.bound,
            self.done
        )
    }
}

/// Threshold test that runs a [`SequentialEstimator`] and accepts when the
/// estimate lies above the midpoint of the indifference region.
#[derive(Debug, Clone)]
pub struct ChowRobbinsTester {
    theta0: f64,
    theta1: f64,
    estimator: SequentialEstimator,
}

impl ChowRobbinsTester {
    /// # Panics
    ///
    /// Panics if `theta1 > theta0`, `delta <= 0`, or `alpha` is outside
    /// `(0, 1)`.
    pub fn new(theta0: f64, theta1: f64, delta: f64, alpha: f64) -> Self {
        assert!(theta1 <= theta0, "theta1 {theta1} exceeds theta0 {theta0}");
        Self {
            theta0,
            theta1,
            estimator: SequentialEstimator::new(delta, alpha),
        }
    }

    pub fn estimator(&self) -> &SequentialEstimator {
        &self.estimator
    }
}

impl BernoulliTester for ChowRobbinsTester {
    fn add_observation(&mut self, observation: bool) {
        self.estimator.add_observation(observation);
    }

    fn set_sample(&mut self, sample: Sample) {
        self.estimator.set_sample(sample);
    }

    fn sample(&self) -> &Sample {
        self.estimator.sample()
    }

    fn done(&self) -> bool {
        self.estimator.done()
    }

    fn accept(&self) -> bool {
        self.estimator.mean() > 0.5 * (self.theta0 + self.theta1)
    }
}

impl Display for ChowRobbinsTester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "theta0={} theta1={} {}",
            self.theta0, self.theta1, self.estimator
        )
    }
}
