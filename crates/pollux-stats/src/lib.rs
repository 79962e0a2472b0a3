//! # pollux-stats: Sequential statistics for `Pollux`
//!
//! Streaming samples and the sequential testers that decide probability
//! thresholds from Bernoulli observations.
//!
//! ## Testers
//!
//! | tester | decision rule | error guarantee |
//! |---|---|---|
//! | [`FixedSampleSizeTester`] | mean vs. midpoint after `n` samples | none |
//! | [`SingleSamplingBernoulliTester`] | curtailed `(n, c)` plan | `(α, β)` |
//! | [`SprtBernoulliTester`] | Wald's log-likelihood ratio | `(α, β)` |
//! | [`ChowRobbinsTester`] | fixed-width interval estimate | coverage `1−α` |
//!
//! All testers implement [`BernoulliTester`]; [`ThresholdTester`] selects
//! one from a [`ThresholdAlgorithm`](pollux_types::ThresholdAlgorithm).
//!
//! ## Example
//!
//! ```
//! use pollux_stats::{BernoulliTester, SprtBernoulliTester};
//!
//! let mut tester = SprtBernoulliTester::new(0.6, 0.4, 0.05, 0.05);
//! while !tester.done() {
//!     tester.add_observation(true);
//! }
//! assert!(tester.accept());
//! ```

mod binomial;
mod estimator;
mod fixed;
mod sample;
mod sprt;
mod ssp;
mod tester;

pub use binomial::{SingleSamplingPlan, binoinv, binomial_cdf};
pub use estimator::{ChowRobbinsTester, SequentialEstimator, chernoff_sample_size};
pub use fixed::FixedSampleSizeTester;
pub use sample::{Observation, Sample};
pub use sprt::SprtBernoulliTester;
pub use ssp::SingleSamplingBernoulliTester;
pub use tester::{BernoulliTester, ThresholdTester};
