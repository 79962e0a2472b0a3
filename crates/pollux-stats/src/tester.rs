use std::fmt::{self, Display};

use pollux_types::{ModelCheckingParams, ThresholdAlgorithm};

use crate::{
    ChowRobbinsTester, FixedSampleSizeTester, Sample, SingleSamplingBernoulliTester,
    SprtBernoulliTester,
};

/// A sequential test over Bernoulli observations.
///
/// Once `done()` is true the verdict is frozen: further observations still
/// update the sample but never change `accept()`. `accept()` is meaningless
/// before `done()`.
pub trait BernoulliTester: Display {
    fn add_observation(&mut self, observation: bool);

    /// Replaces the sample wholesale and recomputes the decision, so a
    /// cached partial run can be resumed.
    fn set_sample(&mut self, sample: Sample);

    fn sample(&self) -> &Sample;

    fn done(&self) -> bool;

    fn accept(&self) -> bool;
}

/// The tester selected by a [`ThresholdAlgorithm`].
#[derive(Debug, Clone)]
pub enum ThresholdTester {
    Fixed(FixedSampleSizeTester),
    SingleSampling(SingleSamplingBernoulliTester),
    Sprt(SprtBernoulliTester),
    ChowRobbins(ChowRobbinsTester),
}

impl ThresholdTester {
    /// Builds the tester for `algorithm` over the indifference region
    /// `(theta1, theta0)`, taking error bounds and sizes from `params`.
    ///
    /// # Panics
    ///
    /// Panics if the region is empty for a sequential algorithm; callers
    /// validate `params` first.
    pub fn new(
        algorithm: ThresholdAlgorithm,
        theta0: f64,
        theta1: f64,
        params: &ModelCheckingParams,
    ) -> Self {
        match algorithm {
            ThresholdAlgorithm::Fixed => ThresholdTester::Fixed(FixedSampleSizeTester::new(
                theta0,
                theta1,
                params.fixed_sample_size,
            )),
            ThresholdAlgorithm::Ssp => ThresholdTester::SingleSampling(
                SingleSamplingBernoulliTester::new(theta0, theta1, params.alpha, params.beta),
            ),
            ThresholdAlgorithm::Sprt => ThresholdTester::Sprt(SprtBernoulliTester::new(
                theta0,
                theta1,
                params.alpha,
                params.beta,
            )),
            ThresholdAlgorithm::ChowRobbins => ThresholdTester::ChowRobbins(
                ChowRobbinsTester::new(
                    theta0,
                    theta1,
                    params.delta,
                    params.alpha.min(params.beta),
                ),
            ),
        }
    }

    fn inner(&self) -> &dyn BernoulliTester {
        match self {
            ThresholdTester::Fixed(t) => t,
            ThresholdTester::SingleSampling(t) => t,
            ThresholdTester::Sprt(t) => t,
            ThresholdTester::ChowRobbins(t) => t,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn BernoulliTester {
        match self {
            ThresholdTester::Fixed(t) => t,
            ThresholdTester::SingleSampling(t) => t,
            ThresholdTester::Sprt(t) => t,
            ThresholdTester::ChowRobbins(t) => t,
        }
    }
}

impl BernoulliTester for ThresholdTester {
    fn add_observation(&mut self, observation: bool) {
        self.inner_mut().add_observation(observation);
    }

    fn set_sample(&mut self, sample: Sample) {
        self.inner_mut().set_sample(sample);
    }

    fn sample(&self) -> &Sample {
        self.inner().sample()
    }

    fn done(&self) -> bool {
        self.inner().done()
    }

    fn accept(&self) -> bool {
        self.inner().accept()
    }
}

impl Display for ThresholdTester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self.inner(), f)
    }
}
