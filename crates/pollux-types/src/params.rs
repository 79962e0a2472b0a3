//! Model-checking parameters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fraction of [`max_nested_error`] used when no nested error is configured.
///
/// Empirical; not derived from a formal bound.
pub const NESTED_ERROR_FRACTION: f64 = 0.8;

/// Largest nested error for which the indifference region around a 0.5
/// threshold stays non-empty: `δ / (0.5 + δ)`.
pub fn max_nested_error(delta: f64) -> f64 {
    if delta > 0.0 {
        delta / (0.5 + delta)
    } else {
        0.0
    }
}

/// Hypothesis-testing algorithm used for probability thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdAlgorithm {
    /// Fixed number of samples, no formal error guarantee.
    Fixed,
    /// Curtailed single sampling plan.
    Ssp,
    /// Wald's sequential probability ratio test.
    #[default]
    Sprt,
    /// Chow–Robbins fixed-width interval, compared against the threshold.
    ChowRobbins,
}

/// Algorithm used for `P=?` estimation queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EstimationAlgorithm {
    /// Sequential Chow–Robbins estimator.
    #[default]
    ChowRobbins,
    /// Fixed sample size from the Chernoff–Hoeffding (Okamoto) bound.
    Chernoff,
}

/// Invalid parameter combination.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    #[error("{name} must be in (0, 1), got {value}")]
    ErrorBoundOutOfRange { name: &'static str, value: f64 },

    #[error("delta must be non-negative, got {0}")]
    NegativeDelta(f64),

    #[error("delta must be positive for the {0:?} algorithm")]
    EmptyIndifferenceRegion(ThresholdAlgorithm),

    #[error("epsilon must be positive, got {0}")]
    NonPositiveEpsilon(f64),

    #[error("fixed sample size must be positive")]
    ZeroSampleSize,

    #[error("nested error {value} must be in (0, {max})")]
    NestedErrorOutOfRange { value: f64, max: f64 },
}

/// Parameters for one verification run.
///
/// The engine overrides `alpha` and `beta` for the duration of recursive
/// calls and restores them afterwards; the caller's copy is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelCheckingParams {
    /// Bound on the probability of rejecting a property that holds.
    pub alpha: f64,
    /// Bound on the probability of accepting a property that fails.
    pub beta: f64,
    /// Half-width of the indifference region around each threshold.
    pub delta: f64,
    /// Convergence precision reserved for exact engines.
    pub epsilon: f64,
    /// Error bound for nested probabilistic checks; derived from `delta`
    /// when unset. Must lie in `(0, max_nested_error(delta))`.
    pub nested_error: Option<f64>,
    /// Sample count for [`ThresholdAlgorithm::Fixed`].
    pub fixed_sample_size: u64,
    /// Hard cutoff on simulated path length; paths reaching it count as
    /// unsatisfied.
    pub max_path_length: Option<u64>,
    /// Cache partial samples per (path property, state).
    pub memoization: bool,
    pub threshold_algorithm: ThresholdAlgorithm,
    pub estimation_algorithm: EstimationAlgorithm,
}

impl Default for ModelCheckingParams {
    fn default() -> Self {
        Self {
            alpha: 0.01,
            beta: 0.01,
            delta: 0.01,
            epsilon: 1e-6,
            nested_error: None,
            fixed_sample_size: 1000,
            max_path_length: None,
            memoization: false,
            threshold_algorithm: ThresholdAlgorithm::default(),
            estimation_algorithm: EstimationAlgorithm::default(),
        }
    }
}

impl ModelCheckingParams {
    /// Returns a copy with the given error bounds.
    pub fn with_error_bounds(&self, alpha: f64, beta: f64) -> Self {
        Self {
            alpha,
            beta,
            ..self.clone()
        }
    }

    /// Nested error used when a path property contains probabilistic
    /// sub-properties.
    pub fn nested_error_bound(&self) -> f64 {
        self.nested_error
            .unwrap_or_else(|| NESTED_ERROR_FRACTION * max_nested_error(self.delta))
    }

    /// Checks the parameters for consistency.
    pub fn validate(&self) -> Result<(), ParamsError> {
        for (name, value) in [("alpha", self.alpha), ("beta", self.beta)] {
            if value.is_nan() || value <= 0.0 || value >= 1.0 {
                return Err(ParamsError::ErrorBoundOutOfRange { name, value });
            }
        }
        if self.delta.is_nan() || self.delta < 0.0 {
            return Err(ParamsError::NegativeDelta(self.delta));
        }
        if self.delta == 0.0 && self.threshold_algorithm != ThresholdAlgorithm::Fixed {
            return Err(ParamsError::EmptyIndifferenceRegion(
                self.threshold_algorithm,
            ));
        }
        if self.epsilon.is_nan() || self.epsilon <= 0.0 {
            return Err(ParamsError::NonPositiveEpsilon(self.epsilon));
        }
        if self.fixed_sample_size == 0 {
            return Err(ParamsError::ZeroSampleSize);
        }
        if let Some(value) = self.nested_error {
            let max = max_nested_error(self.delta);
            if value.is_nan() || value <= 0.0 || value >= max {
                return Err(ParamsError::NestedErrorOutOfRange { value, max });
            }
        }
        Ok(())
    }
}
