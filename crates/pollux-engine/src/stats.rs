use std::fmt::{self, Display};

use pollux_stats::Sample;
use serde::{Deserialize, Serialize};

/// Distributions collected during one top-level verification call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCheckingStats {
    /// Observations used by each top-level threshold test.
    pub sample_size: Sample,
    /// Transitions taken by each simulated path.
    pub path_length: Sample,
    /// Memoization cache size after each store.
    pub sample_cache_size: Sample,
    /// Paths cut off by `max_path_length` and counted as unsatisfied.
    pub truncated_paths: u64,
}

impl ModelCheckingStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Display for ModelCheckingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "samples={} (mean {:.1}) paths={} (mean length {:.1}, max {}) cache={} truncated={}",
            self.sample_size.sum(),
            self.sample_size.mean(),
            self.path_length.count(),
            self.path_length.mean(),
            self.path_length.max().unwrap_or(0.0),
            self.sample_cache_size.max().unwrap_or(0.0),
            self.truncated_paths
        )
    }
}
