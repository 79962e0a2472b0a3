//! # pollux-types: Core types for `Pollux`
//!
//! This crate contains the types shared across the `Pollux` workspace:
//! - Identifiers ([`PropertyId`], [`ClientId`])
//! - Model states and transitions ([`State`], [`Transition`])
//! - The transition sampler seam consumed by the simulator ([`TransitionSampler`])
//! - Pre-compiled state expressions ([`StateExpr`], [`Expression`])
//! - The compiled property tree ([`Property`], [`PathProperty`], [`ThresholdProperty`])
//! - Model-checking parameters ([`ModelCheckingParams`], [`ThresholdAlgorithm`],
//!   [`EstimationAlgorithm`])
//!
//! The parser and model compiler that produce models and property trees
//! live outside this workspace; these types are the interface they target.

use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use rand::RngCore;
use serde::{Deserialize, Serialize};

mod params;
mod property;

pub use params::{
    EstimationAlgorithm, ModelCheckingParams, NESTED_ERROR_FRACTION, ParamsError,
    ThresholdAlgorithm, max_nested_error,
};
pub use property::{Combination, PathProperty, Property, ThresholdOp, ThresholdProperty};

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a compiled path property.
///
/// Assigned by the property compiler; unique within one property tree. It
/// doubles as the property id sent to remote workers in `START` records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct PropertyId(u32);

impl PropertyId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PropertyId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<PropertyId> for u32 {
    fn from(id: PropertyId) -> Self {
        id.0
    }
}

/// Ephemeral identifier the coordinator assigns to a connected worker.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ClientId(u32);

impl ClientId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the id following this one.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

impl From<u32> for ClientId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<ClientId> for u32 {
    fn from(id: ClientId) -> Self {
        id.0
    }
}

// ============================================================================
// States and Transitions
// ============================================================================

/// A model state: a valuation of the model variables plus the simulation
/// time at which the state was entered.
///
/// States are superseded, never mutated: each transition produces a new
/// `State` via [`State::successor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    values: Vec<i64>,
    time: f64,
}

impl State {
    /// Creates a state entered at time zero.
    pub fn new(values: Vec<i64>) -> Self {
        Self { values, time: 0.0 }
    }

    /// Creates a state entered at `time`.
    pub fn at(values: Vec<i64>, time: f64) -> Self {
        Self { values, time }
    }

    /// Returns the variable valuation.
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Returns the value of variable `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a variable of this state.
    pub fn value(&self, index: usize) -> i64 {
        self.values[index]
    }

    /// Returns the time at which this state was entered.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Applies a sampled transition, producing the successor state.
    pub fn successor(&self, transition: Transition) -> Self {
        Self {
            values: transition.values,
            time: self.time + transition.dt,
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, "]@{}", self.time)
    }
}

/// One sampled transition: the next valuation and the time spent in the
/// current state before moving to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub values: Vec<i64>,
    pub dt: f64,
}

impl Transition {
    pub fn new(values: Vec<i64>, dt: f64) -> Self {
        Self { values, dt }
    }

    /// A transition out of an absorbing state: the valuation never changes.
    pub fn absorbing(values: Vec<i64>) -> Self {
        Self {
            values,
            dt: f64::INFINITY,
        }
    }

    /// Returns true if this transition leaves the path stuck forever.
    pub fn is_absorbing(&self) -> bool {
        self.dt.is_infinite()
    }
}

/// Samples the next transition of a compiled stochastic model.
///
/// Implementations must be reproducible: the same RNG stream and the same
/// state always produce the same transition. Discrete-time models return
/// `dt = 1`; absorbing states return [`Transition::absorbing`].
pub trait TransitionSampler {
    fn next(&self, rng: &mut dyn RngCore, state: &State) -> Transition;
}

impl<T: TransitionSampler + ?Sized> TransitionSampler for &T {
    fn next(&self, rng: &mut dyn RngCore, state: &State) -> Transition {
        (**self).next(rng, state)
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// A pre-compiled boolean expression over a state.
pub trait StateExpr: Send + Sync {
    fn holds(&self, state: &State) -> bool;
}

impl<F> StateExpr for F
where
    F: Fn(&State) -> bool + Send + Sync,
{
    fn holds(&self, state: &State) -> bool {
        self(state)
    }
}

/// A shareable compiled expression with a label used in diagnostics.
#[derive(Clone)]
pub struct Expression {
    label: Arc<str>,
    expr: Arc<dyn StateExpr>,
}

impl Expression {
    pub fn new(label: impl Into<Arc<str>>, expr: impl StateExpr + 'static) -> Self {
        Self {
            label: label.into(),
            expr: Arc::new(expr),
        }
    }

    /// The constant expression `true` or `false`.
    pub fn constant(value: bool) -> Self {
        Self::new(value.to_string(), move |_: &State| value)
    }

    /// The expression `x[index] = value`.
    pub fn equals(index: usize, value: i64) -> Self {
        Self::new(format!("x{index}={value}"), move |state: &State| {
            state.value(index) == value
        })
    }

    pub fn holds(&self, state: &State) -> bool {
        self.expr.holds(state)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expression").field(&self.label).finish()
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successor_accumulates_time() {
        let state = State::at(vec![0, 1], 2.5);
        let next = state.successor(Transition::new(vec![1, 1], 0.5));

        assert_eq!(next.values(), &[1, 1]);
        assert_eq!(next.time(), 3.0);
        // The predecessor is untouched.
        assert_eq!(state.values(), &[0, 1]);
    }

    #[test]
    fn absorbing_transition_has_infinite_dwell() {
        let t = Transition::absorbing(vec![3]);
        assert!(t.is_absorbing());
        assert!(State::new(vec![3]).successor(t).time().is_infinite());
    }

    #[test]
    fn expressions_evaluate_against_state() {
        let state = State::new(vec![4, 7]);
        assert!(Expression::equals(1, 7).holds(&state));
        assert!(!Expression::equals(0, 7).holds(&state));
        assert!(Expression::constant(true).holds(&state));

        let closure = Expression::new("x0>3", |s: &State| s.value(0) > 3);
        assert!(closure.holds(&state));
        assert_eq!(closure.to_string(), "x0>3");
    }

    #[test]
    fn state_display_lists_values_and_time() {
        let state = State::at(vec![1, -2], 1.5);
        assert_eq!(state.to_string(), "[1, -2]@1.5");
    }

    #[test]
    fn client_ids_advance() {
        let id = ClientId::new(7);
        assert_eq!(u32::from(id.next()), 8);
        assert_eq!(id.to_string(), "client-7");
    }
}
