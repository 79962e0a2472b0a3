use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use bytes::BytesMut;
use pollux_config::SamplingConfig;
use pollux_engine::SampleSource;
use pollux_types::{ClientId, PropertyId, State};
use pollux_wire::{ClientMessage, RECORD_SIZE, ServerMessage};
use proptest::prelude::*;

use crate::{Producer, SamplingServer, ServerError};

fn coordinator(local_sampling: bool, idle_timeout_ms: u64) -> SamplingServer {
    SamplingServer::bind(SamplingConfig {
        bind_address: "127.0.0.1:0".to_string(),
        local_sampling,
        idle_timeout_ms,
        ..Default::default()
    })
    .unwrap()
}

struct Worker {
    id: ClientId,
    stream: TcpStream,
}

impl Worker {
    /// Connects and waits until the coordinator has registered the worker.
    fn connect(server: &mut SamplingServer) -> Self {
        let mut stream = TcpStream::connect(server.local_addr()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let expected = server.client_count() + 1;
        assert_eq!(
            server
                .wait_for_clients(expected, Duration::from_secs(5))
                .unwrap(),
            expected
        );
        let ServerMessage::Register(id) = read_record(&mut stream) else {
            panic!("expected REGISTER first");
        };
        Self { id, stream }
    }

    fn send(&mut self, property: PropertyId, values: &[bool]) {
        let mut buf = BytesMut::new();
        for &value in values {
            ClientMessage::sample(property, value).encode(&mut buf);
        }
        self.stream.write_all(&buf).unwrap();
    }

    fn hang_up(&self) {
        self.stream.shutdown(Shutdown::Write).unwrap();
    }
}

fn read_record(stream: &mut TcpStream) -> ServerMessage {
    let mut raw = [0u8; RECORD_SIZE];
    stream.read_exact(&mut raw).unwrap();
    ServerMessage::decode(&mut BytesMut::from(&raw[..]))
        .unwrap()
        .unwrap()
}

#[test]
fn workers_get_sequential_ids() {
    let mut server = coordinator(true, 5_000);
    let first = Worker::connect(&mut server);
    let second = Worker::connect(&mut server);

    assert_eq!(first.id, ClientId::new(0));
    assert_eq!(second.id, ClientId::new(1));
    assert_eq!(server.client_count(), 2);
}

#[test]
fn late_worker_is_started_on_connect() {
    let mut server = coordinator(true, 5_000);
    let property = PropertyId::new(7);
    server.start(property);

    let mut worker = Worker::connect(&mut server);
    assert_eq!(read_record(&mut worker.stream), ServerMessage::Start(property));
}

#[test]
fn stop_is_sent_to_live_workers() {
    let mut server = coordinator(true, 5_000);
    let mut worker = Worker::connect(&mut server);

    server.begin(PropertyId::new(1), &State::new(vec![0]));
    assert_eq!(
        read_record(&mut worker.stream),
        ServerMessage::Start(PropertyId::new(1))
    );
    server.end(PropertyId::new(1));
    assert_eq!(read_record(&mut worker.stream), ServerMessage::Stop);
    assert_eq!(server.active_property(), None);
}

#[test]
fn run_from_another_state_is_sampled_locally() {
    let mut server = coordinator(false, 5_000);
    let mut worker = Worker::connect(&mut server);
    let property = PropertyId::new(3);

    // The first run pins the workers' state.
    server.begin(property, &State::new(vec![0]));
    assert_eq!(server.origin(), Some(&[0][..]));
    assert_eq!(read_record(&mut worker.stream), ServerMessage::Start(property));
    server.end(property);
    assert_eq!(read_record(&mut worker.stream), ServerMessage::Stop);

    server.begin(property, &State::new(vec![1]));
    assert_eq!(server.active_property(), Some(property));
    worker.send(property, &[false, false]);
    for _ in 0..3 {
        assert_eq!(server.next_sample(&mut || true), (Producer::Local, true));
    }
    server.end(property);

    // The worker was never started, so nothing reached it.
    worker
        .stream
        .set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();
    let mut raw = [0u8; RECORD_SIZE];
    assert!(worker.stream.read_exact(&mut raw).is_err());
}

#[test]
fn pinned_origin_accepts_later_times() {
    let mut server = coordinator(false, 5_000);
    let mut worker = Worker::connect(&mut server);
    let property = PropertyId::new(4);
    server.set_origin(&State::new(vec![2, 5]));

    server.begin(property, &State::at(vec![2, 5], 3.5));
    assert_eq!(read_record(&mut worker.stream), ServerMessage::Start(property));
    worker.send(property, &[false]);
    assert_eq!(
        server.next_sample(&mut || true),
        (Producer::Remote(worker.id), false)
    );
}

#[test]
fn dead_worker_is_drained_before_leaving() {
    let mut server = coordinator(true, 5_000);
    let mut worker = Worker::connect(&mut server);
    let property = PropertyId::new(2);
    server.start(property);
    assert_eq!(read_record(&mut worker.stream), ServerMessage::Start(property));

    worker.send(property, &[true, true, true]);
    worker.hang_up();

    let remote = Producer::Remote(worker.id);
    let drawn: Vec<(Producer, bool)> = (0..9)
        .map(|_| server.next_sample(&mut || false))
        .collect();
    assert_eq!(
        drawn,
        vec![
            (Producer::Local, false),
            (remote, true),
            (Producer::Local, false),
            (remote, true),
            (Producer::Local, false),
            (remote, true),
            (Producer::Local, false),
            (Producer::Local, false),
            (Producer::Local, false),
        ]
    );
    assert_eq!(server.client_count(), 0);
}

#[test]
fn silent_worker_times_out_and_local_takes_over() {
    let mut server = coordinator(false, 100);
    let mut worker = Worker::connect(&mut server);
    let property = PropertyId::new(3);
    server.start(property);
    assert_eq!(read_record(&mut worker.stream), ServerMessage::Start(property));

    assert_eq!(server.next_sample(&mut || true), (Producer::Local, true));
    assert_eq!(server.client_count(), 0);
}

#[test]
fn no_producers_falls_back_to_local() {
    let mut server = coordinator(false, 5_000);
    server.start(PropertyId::new(0));

    assert_eq!(server.next_sample(&mut || true), (Producer::Local, true));
    assert!(server.next_observation(&mut || true));
}

#[test]
fn stale_samples_are_discarded() {
    let mut server = coordinator(false, 5_000);
    let mut worker = Worker::connect(&mut server);
    let property = PropertyId::new(3);
    server.start(property);
    assert_eq!(read_record(&mut worker.stream), ServerMessage::Start(property));

    worker.send(PropertyId::new(9), &[true, true]);
    worker.send(property, &[false]);

    assert_eq!(
        server.next_sample(&mut || true),
        (Producer::Remote(worker.id), false)
    );
}

#[test]
fn excess_workers_are_rejected() {
    let mut server = SamplingServer::bind(SamplingConfig {
        bind_address: "127.0.0.1:0".to_string(),
        max_clients: 1,
        ..Default::default()
    })
    .unwrap();
    let _first = Worker::connect(&mut server);

    let mut second = TcpStream::connect(server.local_addr()).unwrap();
    second
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    assert_eq!(
        server
            .wait_for_clients(2, Duration::from_millis(300))
            .unwrap(),
        1
    );
    let mut raw = [0u8; RECORD_SIZE];
    assert!(second.read_exact(&mut raw).is_err());
}

#[test]
fn bind_reports_address_in_use() {
    let first = coordinator(true, 5_000);
    let result = SamplingServer::bind(SamplingConfig {
        bind_address: first.local_addr().to_string(),
        ..Default::default()
    });
    assert!(matches!(result, Err(ServerError::BindFailed { addr, .. }) if addr == first.local_addr()));
}

#[test]
fn bind_rejects_invalid_address() {
    let result = SamplingServer::bind(SamplingConfig {
        bind_address: "not an address".to_string(),
        ..Default::default()
    });
    assert!(matches!(result, Err(ServerError::Config(_))));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: each worker's observations are consumed in the order it
    /// sent them, whatever the interleaving across workers.
    #[test]
    fn prop_per_worker_order_preserved(
        streams in prop::collection::vec(prop::collection::vec(any::<bool>(), 0..20), 1..4),
        local_sampling in any::<bool>(),
    ) {
        let mut server = coordinator(local_sampling, 5_000);
        let mut workers: Vec<Worker> =
            streams.iter().map(|_| Worker::connect(&mut server)).collect();
        let property = PropertyId::new(11);
        server.start(property);

        for (worker, values) in workers.iter_mut().zip(&streams) {
            prop_assert_eq!(read_record(&mut worker.stream), ServerMessage::Start(property));
            worker.send(property, values);
            worker.hang_up();
        }

        let total: usize = streams.iter().map(Vec::len).sum();
        let mut received: HashMap<ClientId, Vec<bool>> = HashMap::new();
        let mut remote = 0;
        for _ in 0..(2 * total + 2 * streams.len() + 4) {
            if remote == total {
                break;
            }
            match server.next_sample(&mut || false) {
                (Producer::Remote(id), value) => {
                    received.entry(id).or_default().push(value);
                    remote += 1;
                }
                (Producer::Local, _) => prop_assert!(local_sampling || remote == total),
            }
        }

        prop_assert_eq!(remote, total);
        for (worker, values) in workers.iter().zip(&streams) {
            let got = received.remove(&worker.id).unwrap_or_default();
            prop_assert_eq!(&got, values);
        }
    }
}
