use std::fmt::{self, Display};

use crate::{BernoulliTester, Sample, SingleSamplingPlan};

/// Curtailed single sampling: follows a [`SingleSamplingPlan`] but stops as
/// soon as the remaining observations can no longer change the outcome.
#[derive(Debug, Clone)]
pub struct SingleSamplingBernoulliTester {
    theta0: f64,
    theta1: f64,
    plan: SingleSamplingPlan,
    sample: Sample,
    done: bool,
    accept: bool,
}

impl SingleSamplingBernoulliTester {
    /// # Panics
    ///
    /// Panics unless `0 <= theta1 < theta0 <= 1`.
    pub fn new(theta0: f64, theta1: f64, alpha: f64, beta: f64) -> Self {
        Self {
            theta0,
            theta1,
            plan: SingleSamplingPlan::create(theta0, theta1, alpha, beta),
            sample: Sample::new(),
            done: false,
            accept: false,
        }
    }

    pub fn plan(&self) -> SingleSamplingPlan {
        self.plan
    }

    fn update(&mut self) {
        if self.done {
            return;
        }
        let count = self.sample.count() as i64;
        let positives = self.sample.sum() as i64;
        let n = self.plan.n() as i64;
        let c = self.plan.c();

        if positives > c {
            self.done = true;
            self.accept = true;
        } else if count + c - n >= positives {
            // Even if every remaining observation is positive the sum stays <= c.
            self.done = true;
            self.accept = false;
        }
    }
}

impl BernoulliTester for SingleSamplingBernoulliTester {
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

impl Display for SingleSamplingBernoulliTester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ssp theta0={} theta1={} {} count={} sum={} done={} accept={}",
            self.theta0,
            self.theta1,
            self.plan,
            self.sample.count(),
            self.sample.sum(),
            self.done,
            self.accept
        )
    }
}
