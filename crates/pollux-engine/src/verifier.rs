//! Recursive property evaluation with error budget allocation.

use std::collections::HashMap;
use std::mem;

use pollux_stats::{
    BernoulliTester, Sample, SequentialEstimator, ThresholdTester, chernoff_sample_size,
};
use pollux_types::{
    Combination, EstimationAlgorithm, ModelCheckingParams, PathProperty, Property, PropertyId,
    State, ThresholdProperty, TransitionSampler,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{EngineError, EngineResult, LocalSampling, ModelCheckingStats, SampleSource};

mod until;

/// Memoization key: path property and the valuation it is checked from.
type CacheKey = (PropertyId, Vec<i64>);

/// Result of a `P=?` query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub mean: f64,
    /// The true probability lies in `mean ± half_width` with confidence
    /// `1 - alpha`.
    pub half_width: f64,
    pub sample_size: u64,
}

/// Indifference region `(theta0, theta1)` around `theta`, narrowed by the
/// error of nested probabilistic checks.
///
/// The region is non-empty whenever `nested_error < delta / (0.5 + delta)`.
pub fn indifference_region(theta: f64, delta: f64, nested_error: f64) -> (f64, f64) {
    let theta0 = ((theta + delta) * (1.0 - nested_error)).min(1.0);
    let theta1 = (1.0 - (1.0 - (theta - delta)) * (1.0 - nested_error)).max(0.0);
    (theta0, theta1)
}

/// Statistical model checker over a stochastic model.
///
/// Walks a compiled property tree, deciding each probability threshold with
/// a sequential test over simulated paths. The error budget `(alpha, beta)`
/// is split across boolean combinators so the verdict of the whole property
/// stays within the configured bounds.
///
/// One verifier owns its memoization cache; the cache survives across
/// top-level calls until [`release_property`](Self::release_property) or
/// [`clear_cache`](Self::clear_cache).
pub struct SamplingVerifier<M> {
    model: M,
    rng: SmallRng,
    params: ModelCheckingParams,
    stats: ModelCheckingStats,
    cache: HashMap<CacheKey, Sample>,
    /// Depth of nested probability thresholds at the current frame.
    probabilistic_level: usize,
}

impl<M: TransitionSampler> SamplingVerifier<M> {
    /// Creates a verifier with an entropy-seeded generator.
    pub fn new(model: M, params: ModelCheckingParams) -> EngineResult<Self> {
        Self::with_rng(model, params, SmallRng::from_entropy())
    }

    /// Creates a verifier whose paths are reproducible for a given seed.
    pub fn with_seed(model: M, params: ModelCheckingParams, seed: u64) -> EngineResult<Self> {
        Self::with_rng(model, params, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(model: M, params: ModelCheckingParams, rng: SmallRng) -> EngineResult<Self> {
        params.validate()?;
        Ok(Self {
            model,
            rng,
            params,
            stats: ModelCheckingStats::default(),
            cache: HashMap::new(),
            probabilistic_level: 0,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn params(&self) -> &ModelCheckingParams {
        &self.params
    }

    /// Statistics of the most recent top-level call.
    pub fn stats(&self) -> &ModelCheckingStats {
        &self.stats
    }

    /// Number of memoized samples.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Drops every memoized sample of `property`.
    pub fn release_property(&mut self, property: PropertyId) {
        self.cache.retain(|(id, _), _| *id != property);
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Verifies `property` from `state`, simulating every path locally.
    pub fn verify(&mut self, property: &Property, state: &State) -> bool {
        self.verify_with(property, state, &mut LocalSampling)
    }

    /// Verifies `property` from `state`, drawing the observations of
    /// top-level thresholds from `source`.
    ///
    /// Nested thresholds are always sampled locally. Top-level thresholds
    /// are evaluated from `state` itself, which `source` receives in
    /// [`SampleSource::begin`]; remote producers only contribute when they
    /// simulate from that same state.
    #[instrument(skip_all, fields(property = %property, state = %state))]
    pub fn verify_with(
        &mut self,
        property: &Property,
        state: &State,
        source: &mut dyn SampleSource,
    ) -> bool {
        self.stats.reset();
        self.probabilistic_level = 0;
        let result = self.check(property, state, source);
        info!(result, stats = %self.stats, "verification finished");
        result
    }

    /// Estimates the probability that a path from `state` satisfies `path`.
    pub fn estimate(&mut self, path: &PathProperty, state: &State) -> EngineResult<Estimate> {
        self.estimate_with(path, state, &mut LocalSampling)
    }

    /// Like [`estimate`](Self::estimate), drawing observations from `source`.
    #[instrument(skip_all, fields(property = %path.index(), state = %state))]
    pub fn estimate_with(
        &mut self,
        path: &PathProperty,
        state: &State,
        source: &mut dyn SampleSource,
    ) -> EngineResult<Estimate> {
        let (delta, alpha) = (self.params.delta, self.params.alpha);
        if delta <= 0.0 {
            return Err(EngineError::EstimationWithoutDelta(delta));
        }
        self.stats.reset();
        self.probabilistic_level = 1;
        let nested_error = self.nested_error_for(path);

        source.begin(path.index(), state);
        let estimate = match self.params.estimation_algorithm {
            EstimationAlgorithm::ChowRobbins => {
                let mut estimator = SequentialEstimator::new(delta, alpha);
                while !estimator.done() {
                    let observation = source
                        .next_observation(&mut || self.simulate_until(path, state, nested_error));
                    estimator.add_observation(observation);
                }
                debug!(%estimator, "estimator finished");
                Estimate {
                    mean: estimator.mean(),
                    half_width: estimator.half_width(),
                    sample_size: estimator.sample().count(),
                }
            }
            EstimationAlgorithm::Chernoff => {
                let sample_size = chernoff_sample_size(delta, alpha);
                let mut sample = Sample::new();
                for _ in 0..sample_size {
                    sample.add_observation(
                        source.next_observation(&mut || {
                            self.simulate_until(path, state, nested_error)
                        }),
                    );
                }
                Estimate {
                    mean: sample.mean(),
                    half_width: delta,
                    sample_size,
                }
            }
        };
        source.end(path.index());

        self.probabilistic_level = 0;
        self.stats.sample_size.add_observation(estimate.sample_size);
        info!(
            mean = estimate.mean,
            half_width = estimate.half_width,
            samples = estimate.sample_size,
            "estimation finished"
        );
        Ok(estimate)
    }

    /// Simulates one path from `state` and reports whether it satisfies
    /// `path`, resolving nested thresholds with the same error allotment a
    /// threshold test over `path` would use.
    pub fn sample_path(&mut self, path: &PathProperty, state: &State) -> bool {
        let nested_error = self.nested_error_for(path);
        self.probabilistic_level += 1;
        let observation = self.simulate_until(path, state, nested_error);
        self.probabilistic_level -= 1;
        observation
    }

    // ========================================================================
    // Recursive evaluation
    // ========================================================================

    fn check(&mut self, property: &Property, state: &State, source: &mut dyn SampleSource) -> bool {
        match property {
            Property::Expr(expr) => expr.holds(state),
            Property::Not(operand) => {
                // Negation swaps which error bound applies.
                let (alpha, beta) = (self.params.alpha, self.params.beta);
                !self.with_error_bounds(beta, alpha, |v| v.check(operand, state, source))
            }
            Property::And(combination) => self.check_junction(combination, state, source, true),
            Property::Or(combination) => self.check_junction(combination, state, source, false),
            Property::Iff(combination) => self.check_iff(combination, state, source),
            Property::Threshold(threshold) => self.check_threshold(threshold, state, source),
        }
    }

    /// AND (`conjunction`) or OR. Free operands are evaluated first; the
    /// relevant bound (`alpha` for AND, `beta` for OR) is then split evenly
    /// across the probabilistic operands.
    fn check_junction(
        &mut self,
        combination: &Combination,
        state: &State,
        source: &mut dyn SampleSource,
        conjunction: bool,
    ) -> bool {
        // The value that decides the junction on its own.
        let decisive = !conjunction;

        if combination
            .expr
            .as_ref()
            .is_some_and(|expr| expr.holds(state) == decisive)
        {
            return decisive;
        }

        let (plain, probabilistic): (Vec<&Property>, Vec<&Property>) = combination
            .operands
            .iter()
            .partition(|operand| !operand.is_probabilistic());

        for operand in plain {
            if self.check(operand, state, source) == decisive {
                return decisive;
            }
        }
        if probabilistic.is_empty() {
            return !decisive;
        }

        let k = probabilistic.len() as f64;
        let (alpha, beta) = if conjunction {
            (self.params.alpha / k, self.params.beta)
        } else {
            (self.params.alpha, self.params.beta / k)
        };
        self.with_error_bounds(alpha, beta, |v| {
            for operand in &probabilistic {
                if v.check(operand, state, source) == decisive {
                    return decisive;
                }
            }
            !decisive
        })
    }

    /// Chained equivalence folded left to right, each probabilistic operand
    /// checked with `min(alpha, beta) / k` as both bounds.
    fn check_iff(
        &mut self,
        combination: &Combination,
        state: &State,
        source: &mut dyn SampleSource,
    ) -> bool {
        let k = combination
            .operands
            .iter()
            .filter(|operand| operand.is_probabilistic())
            .count()
            .max(1);
        let bound = self.params.alpha.min(self.params.beta) / k as f64;

        self.with_error_bounds(bound, bound, |v| {
            let mut operands = combination.operands.iter();
            let mut result = match &combination.expr {
                Some(expr) => expr.holds(state),
                None => match operands.next() {
                    Some(first) => v.check(first, state, source),
                    None => true,
                },
            };
            for operand in operands {
                result = result == v.check(operand, state, source);
            }
            result
        })
    }

    fn check_threshold(
        &mut self,
        threshold: &ThresholdProperty,
        state: &State,
        source: &mut dyn SampleSource,
    ) -> bool {
        if let Some(verdict) = threshold.trivial_verdict() {
            return verdict;
        }
        self.probabilistic_level += 1;
        let result = self.run_threshold_test(threshold, state, source);
        self.probabilistic_level -= 1;
        result
    }

    fn run_threshold_test(
        &mut self,
        threshold: &ThresholdProperty,
        state: &State,
        source: &mut dyn SampleSource,
    ) -> bool {
        let path = threshold.path();
        let nested_error = self.nested_error_for(path);
        let (theta0, theta1) =
            indifference_region(threshold.threshold(), self.params.delta, nested_error);
        let mut tester =
            ThresholdTester::new(self.params.threshold_algorithm, theta0, theta1, &self.params);

        let key = self
            .params
            .memoization
            .then(|| (path.index(), state.values().to_vec()));
        if let Some(sample) = key.as_ref().and_then(|key| self.cache.get(key)) {
            tester.set_sample(sample.clone());
        }

        if !tester.done() {
            source.begin(path.index(), state);
            while !tester.done() {
                let observation = source
                    .next_observation(&mut || self.simulate_until(path, state, nested_error));
                tester.add_observation(observation);
            }
            source.end(path.index());
        }

        debug!(
            level = self.probabilistic_level,
            property = %path.index(),
            %state,
            %tester,
            "threshold test finished"
        );

        if self.probabilistic_level == 1 {
            self.stats
                .sample_size
                .add_observation(tester.sample().count());
        }
        if let Some(key) = key {
            self.cache.insert(key, tester.sample().clone());
            self.stats
                .sample_cache_size
                .add_observation(self.cache.len() as u64);
        }
        tester.accept()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Error reserved for nested thresholds inside `path`, zero when there
    /// are none.
    fn nested_error_for(&self, path: &PathProperty) -> f64 {
        if path.is_probabilistic() {
            self.params.nested_error_bound()
        } else {
            0.0
        }
    }

    /// Runs `f` with `(alpha, beta)` overridden, restoring the previous
    /// parameters afterwards.
    fn with_error_bounds<T>(
        &mut self,
        alpha: f64,
        beta: f64,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let scoped = self.params.with_error_bounds(alpha, beta);
        let saved = mem::replace(&mut self.params, scoped);
        let result = f(self);
        self.params = saved;
        result
    }
}
