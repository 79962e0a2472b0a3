//! # pollux-engine: Statistical model checking for `Pollux`
//!
//! Verifies probabilistic temporal properties of stochastic models by
//! simulating paths and deciding each probability threshold with a
//! sequential hypothesis test.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     SamplingVerifier                         │
//! │  ┌──────────────┐   ┌────────────────┐   ┌────────────────┐  │
//! │  │  evaluator   │ → │ ThresholdTester│ ← │  SampleSource  │  │
//! │  │ (AND/OR/NOT) │   │ (pollux-stats) │   │ local / remote │  │
//! │  └──────────────┘   └────────────────┘   └────────────────┘  │
//! │          ↓                                       ↓           │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │ until simulator  → TransitionSampler (compiled model)  │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Boolean combinators split the error budget across their probabilistic
//! operands: `alpha / k` for AND, `beta / k` for OR, `min(alpha, beta) / k`
//! for IFF; NOT swaps `alpha` and `beta`. A threshold over a path that
//! itself contains thresholds narrows its indifference region by the nested
//! error, which the path simulator splits across the nested checks it
//! defers.
//!
//! ## Usage
//!
//! ```
//! use pollux_engine::SamplingVerifier;
//! use pollux_types::{
//!     Expression, ModelCheckingParams, PathProperty, Property, PropertyId, State,
//!     ThresholdOp, Transition, TransitionSampler,
//! };
//! use rand::RngCore;
//!
//! /// Flips `x0` every time unit.
//! struct Toggle;
//!
//! impl TransitionSampler for Toggle {
//!     fn next(&self, _rng: &mut dyn RngCore, state: &State) -> Transition {
//!         Transition::new(vec![1 - state.value(0)], 1.0)
//!     }
//! }
//!
//! let eventually_on = Property::threshold(
//!     ThresholdOp::AtLeast,
//!     0.9,
//!     PathProperty::bounded_until(
//!         PropertyId::new(0),
//!         0.0,
//!         2.0,
//!         Property::expr(Expression::constant(true)),
//!         Property::expr(Expression::equals(0, 1)),
//!     ),
//! );
//!
//! let mut verifier = SamplingVerifier::with_seed(Toggle, ModelCheckingParams::default(), 1)?;
//! assert!(verifier.verify(&eventually_on, &State::new(vec![0])));
//! # Ok::<(), pollux_engine::EngineError>(())
//! ```

mod error;
mod source;
mod stats;
mod verifier;

pub use error::{EngineError, EngineResult};
pub use source::{LocalSampling, SampleSource};
pub use stats::ModelCheckingStats;
pub use verifier::{Estimate, SamplingVerifier, indifference_region};
