//! Until path simulation.
//!
//! A path from `start` satisfies `pre U[min, max] post` if `post` holds in
//! some state occupied at a time `t` in `[min, max]` (relative to `start`)
//! and `pre` holds in every state occupied before that.
//!
//! Each visited state contributes ordered steps:
//!
//! ```text
//! entered at t >= min:            Post(s), Pre(s)
//! entered at t <  min, t+dt > min: Pre(s), Post(s)
//! entered at t <  min, otherwise:  Pre(s)
//! ```
//!
//! Probabilistic `pre`/`post` checks are deferred and resolved in path
//! order. A walk that keeps collecting deferred checks resolves them at
//! checkpoints (after 64, 128, 256, ... states), each checkpoint spending
//! half of the nested error still unspent; the walk stops as soon as a
//! resolved prefix decides the path. Whatever is left when the walk ends
//! goes to the final resolution, split evenly among its deferred checks.

use std::collections::{HashMap, HashSet};

use pollux_types::{PathProperty, Property, State, Transition, TransitionSampler};
use tracing::{debug, trace, warn};

use super::SamplingVerifier;
use crate::LocalSampling;

/// Path length at which pending deferred checks are first resolved.
const FIRST_CHECKPOINT: u64 = 64;

enum Check {
    Known(bool),
    /// Probabilistic check from this state, resolved later in path order.
    Deferred(State),
}

enum Step {
    /// `pre` must hold for the path to continue.
    Pre(Check),
    /// `post` holding here satisfies the path.
    Post(Check),
}

impl Step {
    /// True if this step decides the path without any deferred check.
    fn is_final(&self) -> bool {
        matches!(
            self,
            Step::Pre(Check::Known(false)) | Step::Post(Check::Known(true))
        )
    }

    fn is_deferred(&self) -> bool {
        matches!(self, Step::Pre(Check::Deferred(_)) | Step::Post(Check::Deferred(_)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Satisfied,
    Violated,
    /// No resolved step decided the path.
    Open,
}

/// Steps recorded along one path, resolved a prefix at a time.
struct Trace {
    steps: Vec<Step>,
    /// Steps before this index have been resolved.
    resolved: usize,
    /// `pre` results by state, shared across resolutions.
    pre_results: HashMap<Vec<i64>, bool>,
    /// Nested error not yet spent.
    budget: f64,
}

impl Trace {
    fn new(nested_error: f64) -> Self {
        Self {
            steps: Vec::new(),
            resolved: 0,
            pre_results: HashMap::new(),
            budget: nested_error,
        }
    }

    /// Records `step`, returning true if it ends the walk.
    fn push(&mut self, step: Step) -> bool {
        let decided = step.is_final();
        self.steps.push(step);
        decided
    }

    fn has_pending_deferred(&self) -> bool {
        self.steps[self.resolved..].iter().any(Step::is_deferred)
    }
}

impl<M: TransitionSampler> SamplingVerifier<M> {
    /// Simulates one path from `start` and reports whether it satisfies
    /// `path`.
    pub(super) fn simulate_until(
        &mut self,
        path: &PathProperty,
        start: &State,
        nested_error: f64,
    ) -> bool {
        let mut trace = Trace::new(nested_error);
        let (outcome, length, cut_off) = self.walk(path, start, &mut trace);
        self.stats.path_length.add_observation(length);

        // The cutoff only decides paths no resolved step decided.
        if cut_off && outcome == Outcome::Open {
            self.stats.truncated_paths += 1;
            if self.stats.truncated_paths == 1 {
                warn!(
                    property = %path.index(),
                    length,
                    "path cut off by max_path_length; counted as unsatisfied"
                );
            } else {
                debug!(property = %path.index(), length, "path truncated");
            }
        }
        outcome == Outcome::Satisfied
    }

    /// Advances the path until its outcome no longer depends on further
    /// states, recording the checks each state contributes.
    ///
    /// Returns the outcome, the number of transitions taken and whether
    /// `max_path_length` cut the walk off.
    fn walk(
        &mut self,
        path: &PathProperty,
        start: &State,
        trace: &mut Trace,
    ) -> (Outcome, u64, bool) {
        let (min_time, max_time) = (path.min_time(), path.max_time());
        let origin = start.time();
        let mut current = start.clone();
        let mut length: u64 = 0;
        let mut checkpoint = FIRST_CHECKPOINT;
        let mut cut_off = false;

        loop {
            let t = current.time() - origin;
            let mut sampled: Option<Transition> = None;

            if t >= min_time {
                if trace.push(Step::Post(self.observe(path.post(), &current)))
                    || trace.push(Step::Pre(self.observe(path.pre(), &current)))
                {
                    break;
                }
            } else {
                if trace.push(Step::Pre(self.observe(path.pre(), &current))) {
                    break;
                }
                let transition = self.model.next(&mut self.rng, &current);
                // Still occupied when the window opens.
                if t + transition.dt > min_time
                    && trace.push(Step::Post(self.observe(path.post(), &current)))
                {
                    break;
                }
                sampled = Some(transition);
            }

            if length >= checkpoint && trace.has_pending_deferred() {
                let bound = trace.budget / 2.0;
                trace.budget -= bound;
                trace!(property = %path.index(), length, bound, "resolving path prefix");
                match self.resolve(path, trace, bound) {
                    Outcome::Open => checkpoint = checkpoint.saturating_mul(2),
                    decided => return (decided, length, false),
                }
            }

            if self.params.max_path_length.is_some_and(|limit| length >= limit) {
                cut_off = true;
                break;
            }

            let transition = match sampled {
                Some(transition) => transition,
                None => self.model.next(&mut self.rng, &current),
            };
            if transition.is_absorbing() {
                break;
            }
            current = current.successor(transition);
            length += 1;
            if current.time() - origin > max_time {
                break;
            }
        }

        let budget = trace.budget;
        (self.resolve(path, trace, budget), length, cut_off)
    }

    fn observe(&mut self, property: &Property, state: &State) -> Check {
        if property.is_probabilistic() {
            Check::Deferred(state.clone())
        } else {
            Check::Known(self.check(property, state, &mut LocalSampling))
        }
    }

    /// Replays the unresolved steps in path order: `pre` as a conjunction
    /// over the distinct states it was required in, `post` as a disjunction
    /// over its candidate states. `bound` is split evenly among the checks
    /// this replay can run.
    fn resolve(&mut self, path: &PathProperty, trace: &mut Trace, bound: f64) -> Outcome {
        let first = trace.resolved;
        trace.resolved = trace.steps.len();
        let Trace {
            steps, pre_results, ..
        } = trace;
        let pending = &steps[first..];

        let checks = {
            let deferred_pre: HashSet<&[i64]> = pending
                .iter()
                .filter_map(|step| match step {
                    Step::Pre(Check::Deferred(state))
                        if !pre_results.contains_key(state.values()) =>
                    {
                        Some(state.values())
                    }
                    _ => None,
                })
                .collect();
            let deferred_post = pending
                .iter()
                .filter(|step| matches!(step, Step::Post(Check::Deferred(_))))
                .count();
            deferred_pre.len() + deferred_post
        };
        let bound = bound / checks.max(1) as f64;

        self.with_error_bounds(bound, bound, |v| {
            for step in pending {
                match step {
                    Step::Pre(check) => {
                        let holds = match check {
                            Check::Known(holds) => *holds,
                            Check::Deferred(state) => *pre_results
                                .entry(state.values().to_vec())
                                .or_insert_with(|| v.check(path.pre(), state, &mut LocalSampling)),
                        };
                        if !holds {
                            return Outcome::Violated;
                        }
                    }
                    Step::Post(check) => {
                        let holds = match check {
                            Check::Known(holds) => *holds,
                            Check::Deferred(state) => {
                                v.check(path.post(), state, &mut LocalSampling)
                            }
                        };
                        if holds {
                            return Outcome::Satisfied;
                        }
                    }
                }
            }
            Outcome::Open
        })
    }
}
