//! Compiled property tree.
//!
//! Trees are produced by the property compiler and consumed read-only by
//! the engine. Structural invariants (`0 <= threshold <= 1`,
//! `0 <= min_time <= max_time`) are enforced by the constructors and are
//! fatal when violated.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use crate::{Expression, PropertyId};

/// A state property.
#[derive(Debug, Clone)]
pub enum Property {
    /// Conjunction of an optional expression operand and sub-properties.
    And(Combination),
    /// Disjunction of an optional expression operand and sub-properties.
    Or(Combination),
    /// Chained equivalence of an optional expression operand and sub-properties.
    Iff(Combination),
    /// Negation.
    Not(Box<Property>),
    /// Probability threshold `P{op}θ [path]`.
    Threshold(ThresholdProperty),
    /// Boolean expression evaluated directly against the state.
    Expr(Expression),
}

/// Operands of an n-ary boolean combination.
///
/// The compiler folds every non-probabilistic expression operand into
/// `expr`, so it can be evaluated once without sampling.
#[derive(Debug, Clone)]
pub struct Combination {
    pub expr: Option<Expression>,
    pub operands: Vec<Property>,
}

impl Combination {
    pub fn new(expr: Option<Expression>, operands: Vec<Property>) -> Self {
        Self { expr, operands }
    }
}

/// Comparison used by a probability threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    /// `P >= θ`
    AtLeast,
    /// `P > θ`
    GreaterThan,
}

impl Display for ThresholdOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdOp::AtLeast => f.write_str(">="),
            ThresholdOp::GreaterThan => f.write_str(">"),
        }
    }
}

/// A probability threshold node over a single path property.
#[derive(Debug, Clone)]
pub struct ThresholdProperty {
    op: ThresholdOp,
    threshold: f64,
    path: PathProperty,
}

impl ThresholdProperty {
    /// # Panics
    ///
    /// Panics if `threshold` is not in `[0, 1]`.
    pub fn new(op: ThresholdOp, threshold: f64, path: PathProperty) -> Self {
        assert!(
            (0.0..=1.0).contains(&threshold),
            "probability threshold must be in [0, 1], got {threshold}"
        );
        Self {
            op,
            threshold,
            path,
        }
    }

    pub fn op(&self) -> ThresholdOp {
        self.op
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn path(&self) -> &PathProperty {
        &self.path
    }

    /// Returns `Some(verdict)` when the threshold holds or fails for every
    /// probability, so no sampling is needed.
    pub fn trivial_verdict(&self) -> Option<bool> {
        match self.op {
            ThresholdOp::AtLeast if self.threshold == 0.0 => Some(true),
            ThresholdOp::GreaterThan if self.threshold == 1.0 => Some(false),
            _ => None,
        }
    }
}

/// A compiled `pre U[min_time, max_time] post` path property.
///
/// An unbounded until has `min_time = 0` and `max_time = +inf`.
#[derive(Debug, Clone)]
pub struct PathProperty {
    index: PropertyId,
    min_time: f64,
    max_time: f64,
    pre: Box<Property>,
    post: Box<Property>,
}

impl PathProperty {
    /// Creates an unbounded until.
    pub fn until(index: PropertyId, pre: Property, post: Property) -> Self {
        Self::bounded_until(index, 0.0, f64::INFINITY, pre, post)
    }

    /// Creates a time-bounded until.
    ///
    /// # Panics
    ///
    /// Panics unless `0 <= min_time <= max_time`.
    pub fn bounded_until(
        index: PropertyId,
        min_time: f64,
        max_time: f64,
        pre: Property,
        post: Property,
    ) -> Self {
        assert!(min_time >= 0.0, "min_time must be non-negative");
        assert!(
            min_time <= max_time,
            "min_time {min_time} exceeds max_time {max_time}"
        );
        Self {
            index,
            min_time,
            max_time,
            pre: Box::new(pre),
            post: Box::new(post),
        }
    }

    pub fn index(&self) -> PropertyId {
        self.index
    }

    pub fn min_time(&self) -> f64 {
        self.min_time
    }

    pub fn max_time(&self) -> f64 {
        self.max_time
    }

    pub fn pre(&self) -> &Property {
        &self.pre
    }

    pub fn post(&self) -> &Property {
        &self.post
    }

    pub fn is_bounded(&self) -> bool {
        self.max_time.is_finite()
    }

    /// Returns true if either side contains a probability threshold.
    pub fn is_probabilistic(&self) -> bool {
        self.pre.is_probabilistic() || self.post.is_probabilistic()
    }
}

impl Property {
    pub fn and(expr: Option<Expression>, operands: Vec<Property>) -> Self {
        Property::And(Combination::new(expr, operands))
    }

    pub fn or(expr: Option<Expression>, operands: Vec<Property>) -> Self {
        Property::Or(Combination::new(expr, operands))
    }

    pub fn iff(expr: Option<Expression>, operands: Vec<Property>) -> Self {
        Property::Iff(Combination::new(expr, operands))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Property) -> Self {
        Property::Not(Box::new(operand))
    }

    pub fn threshold(op: ThresholdOp, threshold: f64, path: PathProperty) -> Self {
        Property::Threshold(ThresholdProperty::new(op, threshold, path))
    }

    pub fn expr(expr: Expression) -> Self {
        Property::Expr(expr)
    }

    /// Returns true if this property contains a probability threshold.
    pub fn is_probabilistic(&self) -> bool {
        match self {
            Property::And(c) | Property::Or(c) | Property::Iff(c) => {
                c.operands.iter().any(Property::is_probabilistic)
            }
            Property::Not(operand) => operand.is_probabilistic(),
            Property::Threshold(_) => true,
            Property::Expr(_) => false,
        }
    }

    /// Collects every path property in the tree, keyed by index.
    ///
    /// Remote workers use this to resolve the property named in a `START`
    /// record.
    pub fn path_properties(&self) -> BTreeMap<PropertyId, &PathProperty> {
        let mut found = BTreeMap::new();
        self.collect_paths(&mut found);
        found
    }

    fn collect_paths<'a>(&'a self, found: &mut BTreeMap<PropertyId, &'a PathProperty>) {
        match self {
            Property::And(c) | Property::Or(c) | Property::Iff(c) => {
                for operand in &c.operands {
                    operand.collect_paths(found);
                }
            }
            Property::Not(operand) => operand.collect_paths(found),
            Property::Threshold(t) => {
                let path = t.path();
                found.insert(path.index(), path);
                path.pre().collect_paths(found);
                path.post().collect_paths(found);
            }
            Property::Expr(_) => {}
        }
    }
}

impl Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(
            f: &mut fmt::Formatter<'_>,
            c: &Combination,
            separator: &str,
        ) -> fmt::Result {
            write!(f, "(")?;
            let mut first = true;
            if let Some(expr) = &c.expr {
                write!(f, "{expr}")?;
                first = false;
            }
            for operand in &c.operands {
                if !first {
                    write!(f, " {separator} ")?;
                }
                write!(f, "{operand}")?;
                first = false;
            }
            write!(f, ")")
        }

        match self {
            Property::And(c) => join(f, c, "&"),
            Property::Or(c) => join(f, c, "|"),
            Property::Iff(c) => join(f, c, "<=>"),
            Property::Not(operand) => write!(f, "!{operand}"),
            Property::Threshold(t) => write!(f, "P{}{} [{}]", t.op(), t.threshold(), t.path()),
            Property::Expr(expr) => write!(f, "{expr}"),
        }
    }
}

impl Display for PathProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bounded() || self.min_time > 0.0 {
            write!(
                f,
                "{} U[{},{}] {}",
                self.pre, self.min_time, self.max_time, self.post
            )
        } else {
            write!(f, "{} U {}", self.pre, self.post)
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn leaf(label: &str) -> Property {
        Property::expr(Expression::new(label.to_string(), |_: &crate::State| true))
    }

    fn nested(index: u32) -> Property {
        Property::threshold(
            ThresholdOp::AtLeast,
            0.5,
            PathProperty::until(PropertyId::new(index), leaf("a"), leaf("b")),
        )
    }

    #[test]
    fn expression_leaves_are_not_probabilistic() {
        let p = Property::and(None, vec![leaf("a"), Property::not(leaf("b"))]);
        assert!(!p.is_probabilistic());
    }

    #[test]
    fn threshold_anywhere_makes_property_probabilistic() {
        let p = Property::or(None, vec![leaf("a"), Property::not(nested(1))]);
        assert!(p.is_probabilistic());
    }

    #[test]
    fn path_properties_are_collected_through_nesting() {
        let inner = nested(2);
        let outer = Property::threshold(
            ThresholdOp::GreaterThan,
            0.1,
            PathProperty::bounded_until(PropertyId::new(1), 0.0, 5.0, leaf("a"), inner),
        );
        let tree = Property::and(None, vec![outer, nested(3)]);

        let paths = tree.path_properties();
        let ids: Vec<u32> = paths.keys().map(|id| u32::from(*id)).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(paths[&PropertyId::new(1)].is_probabilistic());
        assert!(!paths[&PropertyId::new(2)].is_probabilistic());
    }

    #[test_case(ThresholdOp::AtLeast, 0.0 => Some(true); "at least zero always holds")]
    #[test_case(ThresholdOp::GreaterThan, 1.0 => Some(false); "above one never holds")]
    #[test_case(ThresholdOp::AtLeast, 1.0 => None; "at least one needs sampling")]
    #[test_case(ThresholdOp::GreaterThan, 0.0 => None; "above zero needs sampling")]
    fn trivial_thresholds(op: ThresholdOp, threshold: f64) -> Option<bool> {
        let path = PathProperty::until(PropertyId::new(0), leaf("a"), leaf("b"));
        ThresholdProperty::new(op, threshold, path).trivial_verdict()
    }

    #[test]
    #[should_panic(expected = "probability threshold must be in [0, 1]")]
    fn threshold_out_of_range_panics() {
        let path = PathProperty::until(PropertyId::new(0), leaf("a"), leaf("b"));
        let _ = ThresholdProperty::new(ThresholdOp::AtLeast, 1.5, path);
    }

    #[test]
    #[should_panic(expected = "exceeds max_time")]
    fn inverted_time_window_panics() {
        let _ = PathProperty::bounded_until(PropertyId::new(0), 3.0, 1.0, leaf("a"), leaf("b"));
    }

    #[test]
    fn display_renders_formula() {
        let path = PathProperty::bounded_until(PropertyId::new(0), 0.0, 2.0, leaf("a"), leaf("b"));
        let p = Property::not(Property::threshold(ThresholdOp::AtLeast, 0.9, path));
        assert_eq!(p.to_string(), "!P>=0.9 [a U[0,2] b]");
    }
}
