//! End-to-end verification with remote workers.

use std::collections::HashMap;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use pollux_client::{ClientError, SamplingWorker};
use pollux_config::SamplingConfig;
use pollux_engine::SamplingVerifier;
use pollux_server::SamplingServer;
use pollux_types::{
    EstimationAlgorithm, Expression, ModelCheckingParams, PathProperty, Property, PropertyId,
    State, ThresholdOp, Transition, TransitionSampler,
};
use rand::{Rng, RngCore};

/// From `[0, 0]` moves to `[1, 1]` with probability `p` and to `[1, 0]`
/// otherwise; every other state is absorbing.
#[derive(Clone, Copy)]
struct Coin {
    p: f64,
}

impl TransitionSampler for Coin {
    fn next(&self, rng: &mut dyn RngCore, state: &State) -> Transition {
        if state.value(0) == 0 {
            Transition::new(vec![1, i64::from(rng.gen_bool(self.p))], 1.0)
        } else {
            Transition::absorbing(state.values().to_vec())
        }
    }
}

fn heads() -> PathProperty {
    PathProperty::until(
        PropertyId::new(0),
        Property::expr(Expression::constant(true)),
        Property::expr(Expression::equals(1, 1)),
    )
}

fn start() -> State {
    State::new(vec![0, 0])
}

fn params() -> ModelCheckingParams {
    ModelCheckingParams {
        delta: 0.05,
        ..Default::default()
    }
}

fn coordinator(local_sampling: bool, idle_timeout_ms: u64) -> SamplingServer {
    SamplingServer::bind(SamplingConfig {
        bind_address: "127.0.0.1:0".to_string(),
        local_sampling,
        idle_timeout_ms,
        ..Default::default()
    })
    .unwrap()
}

/// Runs a worker over [`Coin`] that can sample the paths of `property`.
fn spawn_worker(
    server: &SamplingServer,
    model: Coin,
    property: &Property,
    seed: u64,
) -> JoinHandle<Result<(), ClientError>> {
    let addr = server.local_addr();
    let paths: HashMap<PropertyId, PathProperty> = property
        .path_properties()
        .into_iter()
        .map(|(id, path)| (id, path.clone()))
        .collect();

    thread::spawn(move || {
        let mut verifier = SamplingVerifier::with_seed(model, params(), seed).unwrap();
        let mut worker = SamplingWorker::connect(addr)?;
        worker.run(|id| {
            let path = paths.get(&id)?;
            Some(verifier.sample_path(path, &start()))
        })
    })
}

#[test]
fn remote_workers_decide_a_threshold() {
    let property = Property::threshold(ThresholdOp::AtLeast, 0.5, heads());
    let mut server = coordinator(false, 5_000);
    let workers: Vec<_> = (0..2)
        .map(|seed| spawn_worker(&server, Coin { p: 0.8 }, &property, seed))
        .collect();
    assert_eq!(
        server.wait_for_clients(2, Duration::from_secs(5)).unwrap(),
        2
    );

    let mut verifier = SamplingVerifier::with_seed(Coin { p: 0.8 }, params(), 99).unwrap();
    assert!(verifier.verify_with(&property, &start(), &mut server));
    assert!(verifier.stats().sample_size.sum() > 0.0);
    // Every observation came from the workers.
    assert_eq!(verifier.stats().path_length.count(), 0);
    assert_eq!(server.active_property(), None);

    drop(server);
    for worker in workers {
        worker.join().unwrap().unwrap();
    }
}

#[test]
fn remote_and_local_samples_combine_in_an_estimate() {
    let params = ModelCheckingParams {
        estimation_algorithm: EstimationAlgorithm::Chernoff,
        ..params()
    };
    let property = Property::threshold(ThresholdOp::AtLeast, 0.5, heads());
    let mut server = coordinator(true, 5_000);
    let worker = spawn_worker(&server, Coin { p: 0.3 }, &property, 7);
    assert_eq!(
        server.wait_for_clients(1, Duration::from_secs(5)).unwrap(),
        1
    );

    let mut verifier = SamplingVerifier::with_seed(Coin { p: 0.3 }, params, 3).unwrap();
    let estimate = verifier
        .estimate_with(&heads(), &start(), &mut server)
        .unwrap();
    assert!((estimate.mean - 0.3).abs() <= estimate.half_width, "{estimate:?}");
    // Local and remote producers alternate.
    let local = verifier.stats().path_length.count();
    assert!(local > 0 && local < estimate.sample_size);

    drop(server);
    worker.join().unwrap().unwrap();
}

#[test]
fn worker_that_cannot_sample_is_timed_out() {
    let property = Property::threshold(ThresholdOp::AtLeast, 0.5, heads());
    let mut server = coordinator(false, 200);
    // The worker knows no path properties.
    let worker = spawn_worker(
        &server,
        Coin { p: 0.8 },
        &Property::expr(Expression::constant(true)),
        1,
    );
    assert_eq!(
        server.wait_for_clients(1, Duration::from_secs(5)).unwrap(),
        1
    );

    let mut verifier = SamplingVerifier::with_seed(Coin { p: 0.8 }, params(), 5).unwrap();
    assert!(verifier.verify_with(&property, &start(), &mut server));
    assert_eq!(server.client_count(), 0);
    assert_eq!(
        verifier.stats().path_length.count() as f64,
        verifier.stats().sample_size.sum()
    );

    drop(server);
    worker.join().unwrap().unwrap();
}

#[test]
fn connect_fails_without_coordinator() {
    let addr = {
        let server = coordinator(false, 5_000);
        server.local_addr()
    };
    assert!(matches!(
        SamplingWorker::connect(addr),
        Err(ClientError::Connect { .. })
    ));
}
