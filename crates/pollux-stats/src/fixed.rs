use std::fmt::{self, Display};

use crate::{BernoulliTester, Sample};

/// Decides after exactly `n` observations by comparing the sample mean with
/// the midpoint of the indifference region.
///
/// Carries no formal error guarantee: the error depends entirely on `n`.
#[derive(Debug, Clone)]
pub struct FixedSampleSizeTester {
    theta0: f64,
    theta1: f64,
    sample_size: u64,
    sample: Sample,
    done: bool,
    accept: bool,
}

impl FixedSampleSizeTester {
    /// # Panics
    ///
    /// Panics if `theta1 > theta0` or `sample_size` is zero.
    pub fn new(theta0: f64, theta1: f64, sample_size: u64) -> Self {
        assert!(theta1 <= theta0, "theta1 {theta1} exceeds theta0 {theta0}");
        assert!(sample_size > 0, "fixed sample size must be positive");
        Self {
            theta0,
            theta1,
            sample_size,
            sample: Sample::new(),
            done: false,
            accept: false,
        }
    }

    pub fn sample_size(&self) -> u64 {
        self.sample_size
    }

    fn update(&mut self) {
        if !self.done && self.sample.count() >= self.sample_size {
            self.done = true;
            self.accept = self.sample.mean() > 0.5 * (self.theta0 + self.theta1);
        }
    }
}

impl BernoulliTester for FixedSampleSizeTester {
    fn add_observation(&mut self, observation: bool) {
        self.sample.add_observation(observation);
        self.update();
    }

    fn set_sample(&mut self, sample: Sample) {
        self.sample = sample;
        self.done = false;
        self.accept = false;
        self.update();
    }

    fn sample(&self) -> &Sample {
        &self.sample
    }

    fn done(&self) -> bool {
        self.done
    }

    fn accept(&self) -> bool {
        self.accept
    }
}

impl Display for FixedSampleSizeTester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fixed theta0={} theta1={} n={} count={} mean={} done={} accept={}",
            self.theta0,
            self.theta1,
            self.sample_size,
            self.sample.count(),
            self.sample.mean(),
            self.done,
            self.accept
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decides_after_exactly_n_observations() {
        let mut tester = FixedSampleSizeTester::new(0.55, 0.45, 4);
        for x in [true, true, false] {
            tester.add_observation(x);
            assert!(!tester.done());
        }
        tester.add_observation(true);
        assert!(tester.done());
        assert!(tester.accept());
    }

    #[test]
    fn equal_hypotheses_compare_against_threshold() {
        let mut tester = FixedSampleSizeTester::new(0.5, 0.5, 2);
        tester.add_observation(true);
        tester.add_observation(false);
        assert!(tester.done());
        // mean 0.5 is not strictly above 0.5
        assert!(!tester.accept());
    }

    #[test]
    fn verdict_is_frozen_once_done() {
        let mut tester = FixedSampleSizeTester::new(0.6, 0.4, 1);
        tester.add_observation(false);
        assert!(tester.done() && !tester.accept());
        for _ in 0..10 {
            tester.add_observation(true);
        }
        assert!(!tester.accept());
        assert_eq!(tester.sample().count(), 11);
    }

    #[test]
    fn resuming_from_a_complete_sample_is_done() {
        let mut sample = Sample::new();
        for _ in 0..5 {
            sample.add_observation(true);
        }
        let mut tester = FixedSampleSizeTester::new(0.6, 0.4, 5);
        tester.set_sample(sample);
        assert!(tester.done());
        assert!(tester.accept());
    }
}
