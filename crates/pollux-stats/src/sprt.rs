use std::fmt::{self, Display};

use crate::{BernoulliTester, Sample};

/// Wald's sequential probability ratio test for `H0: p >= theta0` against
/// `H1: p <= theta1`.
///
/// The log-likelihood ratio is recomputed from the positive and negative
/// counts, so a degenerate coefficient (`-inf` when `theta1 = 0`, `+inf`
/// when `theta0 = 1`) decides the test on the first observation of that
/// kind without producing `0 * inf`.
#[derive(Debug, Clone)]
pub struct SprtBernoulliTester {
    theta0: f64,
    theta1: f64,
    positive_coefficient: f64,
    negative_coefficient: f64,
    accept_threshold: f64,
    reject_threshold: f64,
    sample: Sample,
    llr: f64,
    done: bool,
    accept: bool,
}

impl SprtBernoulliTester {
    /// # Panics
    ///
    /// Panics unless `0 <= theta1 < theta0 <= 1` and `alpha`, `beta` are in
    /// `(0, 1)`.
    pub fn new(theta0: f64, theta1: f64, alpha: f64, beta: f64) -> Self {
        assert!(
            0.0 <= theta1 && theta1 < theta0 && theta0 <= 1.0,
            "sprt needs 0 <= theta1 < theta0 <= 1, got ({theta0}, {theta1})"
        );
        assert!(alpha > 0.0 && alpha < 1.0 && beta > 0.0 && beta < 1.0);

        let positive_coefficient = if theta1 > 0.0 {
            (theta1 / theta0).ln()
        } else {
            f64::NEG_INFINITY
        };
        let negative_coefficient = if theta0 < 1.0 {
            ((1.0 - theta1) / (1.0 - theta0)).ln()
        } else {
            f64::INFINITY
        };

        let mut accept_threshold = beta.ln();
        if theta0 < 1.0 {
            accept_threshold -= (1.0 - alpha).ln();
        }
        let mut reject_threshold = -alpha.ln();
        if theta1 > 0.0 {
            reject_threshold += (1.0 - beta).ln();
        }

        Self {
            theta0,
            theta1,
            positive_coefficient,
            negative_coefficient,
            accept_threshold,
            reject_threshold,
            sample: Sample::new(),
            llr: 0.0,
            done: false,
            accept: false,
        }
    }

    /// Current log-likelihood ratio `ln(L(theta1) / L(theta0))`.
    pub fn log_likelihood_ratio(&self) -> f64 {
        self.llr
    }

    fn update(&mut self) {
        if self.done {
            return;
        }
        let positives = self.sample.sum();
        let negatives = self.sample.count() as f64 - positives;

        let mut llr = 0.0;
        if positives > 0.0 {
            llr += positives * self.positive_coefficient;
        }
        if negatives > 0.0 {
            llr += negatives * self.negative_coefficient;
        }
        self.llr = llr;

        if llr <= self.accept_threshold {
            self.done = true;
            self.accept = true;
        } else if llr > self.reject_threshold {
            self.done = true;
            self.accept = false;
        }
    }
}

impl BernoulliTester for SprtBernoulliTester {
    fn add_observation(&mut self, observation: bool) {
        self.sample.add_observation(observation);
        self.update();
    }

    fn set_sample(&mut self, sample: Sample) {
        self.sample = sample;
        self.llr = 0.0;
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

impl Display for SprtBernoulliTester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sprt theta0={} theta1={} llr={} accept<={} reject>{} count={} done={} accept={}",
            self.theta0,
            self.theta1,
            self.llr,
            self.accept_threshold,
            self.reject_threshold,
            self.sample.count(),
            self.done,
            self.accept
        )
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn run(tester: &mut SprtBernoulliTester, rng: &mut SmallRng, p: f64) -> bool {
        while !tester.done() {
            tester.add_observation(rng.gen_bool(p));
        }
        tester.accept()
    }

    /// Runs `runs` independent tests at `p` and counts acceptances.
    fn acceptances(seed: u64, runs: usize, p: f64, bounds: (f64, f64, f64, f64)) -> usize {
        let (theta0, theta1, alpha, beta) = bounds;
        let mut rng = SmallRng::seed_from_u64(seed);
        (0..runs)
            .filter(|_| {
                let mut tester = SprtBernoulliTester::new(theta0, theta1, alpha, beta);
                run(&mut tester, &mut rng, p)
            })
            .count()
    }

    /// Smallest count a binomial `(runs, rate)` falls below with
    /// probability under 0.2%, i.e. three standard deviations.
    fn lower_tolerance(runs: usize, rate: f64) -> f64 {
        let n = runs as f64;
        n * rate - 3.0 * (n * rate * (1.0 - rate)).sqrt()
    }

    #[test]
    fn accept_rate_at_theta0_respects_alpha() {
        let (theta0, theta1, alpha, beta) = (0.6, 0.4, 0.05, 0.05);
        let runs = 4000;
        let accepted = acceptances(7, runs, theta0, (theta0, theta1, alpha, beta));
        assert!(
            accepted as f64 >= lower_tolerance(runs, 1.0 - alpha),
            "accepted {accepted} of {runs}"
        );
    }

    #[test]
    fn reject_rate_at_theta1_respects_beta() {
        let (theta0, theta1, alpha, beta) = (0.6, 0.4, 0.05, 0.05);
        let runs = 4000;
        let rejected = runs - acceptances(11, runs, theta1, (theta0, theta1, alpha, beta));
        assert!(
            rejected as f64 >= lower_tolerance(runs, 1.0 - beta),
            "rejected {rejected} of {runs}"
        );
    }

    #[test]
    fn unequal_error_bounds_hold_at_region_edges() {
        let bounds = (0.55, 0.45, 0.01, 0.1);
        let runs = 2000;
        let accepted = acceptances(13, runs, 0.55, bounds);
        assert!(
            accepted as f64 >= lower_tolerance(runs, 0.99),
            "accepted {accepted} of {runs}"
        );
        let rejected = runs - acceptances(17, runs, 0.45, bounds);
        assert!(
            rejected as f64 >= lower_tolerance(runs, 0.9),
            "rejected {rejected} of {runs}"
        );
    }

    #[test]
    fn statistic_on_the_reject_threshold_does_not_reject() {
        // Each negative adds ln 2; pin the threshold to four of them.
        let mut tester = SprtBernoulliTester::new(0.5, 0.0, 0.05, 0.5);
        tester.reject_threshold = 4.0 * 2f64.ln();
        for _ in 0..4 {
            tester.add_observation(false);
        }
        assert_eq!(tester.log_likelihood_ratio(), tester.reject_threshold);
        assert!(!tester.done(), "{tester}");
        tester.add_observation(false);
        assert!(tester.done() && !tester.accept());
    }

    #[test]
    fn zero_theta1_accepts_on_first_positive() {
        let mut tester = SprtBernoulliTester::new(0.2, 0.0, 0.01, 0.01);
        tester.add_observation(false);
        assert!(!tester.done());
        tester.add_observation(true);
        assert!(tester.done() && tester.accept());
        assert_eq!(tester.log_likelihood_ratio(), f64::NEG_INFINITY);
    }

    #[test]
    fn unit_theta0_rejects_on_first_negative() {
        let mut tester = SprtBernoulliTester::new(1.0, 0.8, 0.01, 0.01);
        tester.add_observation(true);
        assert!(!tester.done());
        tester.add_observation(false);
        assert!(tester.done() && !tester.accept());
    }

    #[test]
    fn resuming_matches_incremental_run() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut incremental = SprtBernoulliTester::new(0.55, 0.45, 0.01, 0.01);
        let mut sample = Sample::new();
        for _ in 0..20 {
            let x = rng.gen_bool(0.5);
            incremental.add_observation(x);
            sample.add_observation(x);
        }

        let mut resumed = SprtBernoulliTester::new(0.55, 0.45, 0.01, 0.01);
        resumed.set_sample(sample);
        assert!((resumed.log_likelihood_ratio() - incremental.log_likelihood_ratio()).abs() < 1e-9);
        assert_eq!(resumed.done(), incremental.done());
    }
}
