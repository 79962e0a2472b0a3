//! Verification runs driven by a loaded `pollux.toml`.

use std::fs;

use pollux_config::{ConfigLoader, PolluxConfig};
use pollux_engine::SamplingVerifier;
use pollux_types::{
    Expression, PathProperty, Property, PropertyId, State, ThresholdAlgorithm, ThresholdOp,
    Transition, TransitionSampler,
};
use rand::RngCore;

/// Counts `x0` up forever.
struct Counter;

impl TransitionSampler for Counter {
    fn next(&self, _rng: &mut dyn RngCore, state: &State) -> Transition {
        Transition::new(vec![state.value(0) + 1], 1.0)
    }
}

fn load(toml: &str) -> PolluxConfig {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("pollux.toml"), toml).unwrap();
    ConfigLoader::new()
        .with_project_dir(dir.path())
        .with_env_prefix("POLLUX_ENGINE_TEST_UNSET")
        .without_user_config()
        .load()
        .unwrap()
}

fn reaches(id: u32, value: i64) -> PathProperty {
    PathProperty::until(
        PropertyId::new(id),
        Property::expr(Expression::constant(true)),
        Property::expr(Expression::equals(0, value)),
    )
}

#[test]
fn configured_algorithm_and_memoization_apply() {
    let config = load(
        r#"
[checking]
delta = 0.05
threshold_algorithm = "ssp"
memoization = true
"#,
    );
    assert_eq!(config.checking.threshold_algorithm, ThresholdAlgorithm::Ssp);

    let property = Property::threshold(ThresholdOp::AtLeast, 0.9, reaches(0, 3));
    let mut verifier = SamplingVerifier::with_seed(Counter, config.checking, 1).unwrap();
    let start = State::new(vec![0]);

    assert!(verifier.verify(&property, &start));
    assert_eq!(verifier.cache_len(), 1);
    assert!(verifier.verify(&property, &start));
    assert_eq!(verifier.stats().path_length.count(), 0);
}

#[test]
fn configured_path_cap_truncates_and_is_reported() {
    let config = load(
        r"
[checking]
delta = 0.05
max_path_length = 5
",
    );

    let property = Property::threshold(ThresholdOp::AtLeast, 0.5, reaches(0, 100));
    let mut verifier = SamplingVerifier::with_seed(Counter, config.checking, 1).unwrap();
    assert!(!verifier.verify(&property, &State::new(vec![0])));

    let stats = verifier.stats();
    assert_eq!(stats.truncated_paths, stats.path_length.count());
    assert_eq!(stats.path_length.max(), Some(5.0));

    let report = serde_json::to_value(stats).unwrap();
    assert_eq!(report["truncated_paths"], stats.truncated_paths);
}
