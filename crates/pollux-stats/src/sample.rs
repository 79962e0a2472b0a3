//! Streaming sample statistics (Welford's algorithm).

use serde::{Deserialize, Serialize};

/// A scalar observation that can be folded into a [`Sample`].
pub trait Observation: Copy {
    fn value(self) -> f64;
}

impl Observation for bool {
    fn value(self) -> f64 {
        if self { 1.0 } else { 0.0 }
    }
}

impl Observation for i32 {
    fn value(self) -> f64 {
        f64::from(self)
    }
}

impl Observation for i64 {
    fn value(self) -> f64 {
        self as f64
    }
}

impl Observation for u64 {
    fn value(self) -> f64 {
        self as f64
    }
}

impl Observation for f64 {
    fn value(self) -> f64 {
        self
    }
}

/// Incremental mean/variance accumulator.
///
/// Mean and variances are only meaningful once observations exist; an empty
/// sample reports zero for all of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    count: u64,
    sum: f64,
    mean: f64,
    /// Sum of squared deviations from the running mean.
    m2: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl Sample {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observation<T: Observation>(&mut self, observation: T) {
        let x = observation.value();
        self.count += 1;
        self.sum += x;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
        self.min = Some(self.min.map_or(x, |m| m.min(x)));
        self.max = Some(self.max.map_or(x, |m| m.max(x)));
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance `m2 / n`.
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    /// Unbiased variance `m2 / (n - 1)`.
    pub fn sample_variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn sample_stddev(&self) -> f64 {
        self.sample_variance().sqrt()
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }
}
