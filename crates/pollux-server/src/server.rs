//! The sampling coordinator event loop.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use pollux_config::SamplingConfig;
use pollux_engine::SampleSource;
use pollux_types::{ClientId, PropertyId, State};
use pollux_wire::ServerMessage;
use tracing::{debug, info, instrument, trace, warn};

use crate::connection::ClientConnection;
use crate::error::{ServerError, ServerResult};

/// Token for the listening socket.
const LISTENER_TOKEN: Token = Token(0);

const EVENTS_CAPACITY: usize = 128;

fn token_for(id: ClientId) -> Token {
    Token(u32::from(id) as usize + 1)
}

fn client_for(token: Token) -> ClientId {
    ClientId::new((token.0 - 1) as u32)
}

/// Where one observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Producer {
    /// Simulated in-process.
    Local,
    /// Received from a connected worker.
    Remote(ClientId),
}

enum Pending {
    Ready(bool),
    Wait(Duration),
    Gone,
}

/// Coordinator that merges observations from the local simulator and any
/// number of remote workers.
///
/// Producers are served round-robin: the head of the schedule yields its
/// next observation (waiting for a remote one if none is buffered) and moves
/// to the tail. Workers that disconnect, misbehave or stay silent past the
/// idle timeout are marked dead; their buffered observations are still
/// consumed before they leave the schedule. With no producer left the
/// coordinator simulates locally.
///
/// Workers simulate from their own initial state. The coordinator is pinned
/// to that state (by [`set_origin`](Self::set_origin), or else by the first
/// run it serves) and simulates every run from another state locally.
pub struct SamplingServer {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    local_addr: SocketAddr,
    config: SamplingConfig,
    clients: HashMap<ClientId, ClientConnection>,
    next_id: ClientId,
    schedule: VecDeque<Producer>,
    active: Option<PropertyId>,
    /// Values of the state workers simulate from.
    origin: Option<Vec<i64>>,
    /// The active run starts away from `origin`; workers are not involved.
    local_only: bool,
    warned_fallback: bool,
}

impl SamplingServer {
    /// Binds the listener described by `config`.
    pub fn bind(config: SamplingConfig) -> ServerResult<Self> {
        config.validate()?;
        let addr = config.socket_addr()?;
        let poll = Poll::new()?;
        let mut listener =
            TcpListener::bind(addr).map_err(|source| ServerError::BindFailed { addr, source })?;
        let local_addr = listener.local_addr()?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;
        info!(%local_addr, local_sampling = config.local_sampling, "sampling coordinator listening");

        let mut schedule = VecDeque::new();
        if config.local_sampling {
            schedule.push_back(Producer::Local);
        }
        Ok(Self {
            poll,
            events: Events::with_capacity(EVENTS_CAPACITY),
            listener,
            local_addr,
            config,
            clients: HashMap::new(),
            next_id: ClientId::default(),
            schedule,
            active: None,
            origin: None,
            local_only: false,
            warned_fallback: false,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connected workers not yet marked dead.
    pub fn client_count(&self) -> usize {
        self.clients.values().filter(|client| !client.dead).count()
    }

    /// Property whose observations are currently being collected.
    pub fn active_property(&self) -> Option<PropertyId> {
        self.active
    }

    /// Pins the state workers simulate from.
    pub fn set_origin(&mut self, state: &State) {
        self.origin = Some(state.values().to_vec());
    }

    /// Values of the state workers simulate from, once pinned.
    pub fn origin(&self) -> Option<&[i64]> {
        self.origin.as_deref()
    }

    /// Accepts workers until `count` are connected or `timeout` elapses.
    ///
    /// Returns the number of connected workers.
    pub fn wait_for_clients(&mut self, count: usize, timeout: Duration) -> ServerResult<usize> {
        let deadline = Instant::now() + timeout;
        loop {
            let connected = self.client_count();
            let now = Instant::now();
            if connected >= count || now >= deadline {
                return Ok(connected);
            }
            self.poll_once(Some(deadline - now))?;
        }
    }

    // ========================================================================
    // Run control
    // ========================================================================

    /// Starts collecting observations for `property` and tells every worker
    /// to produce them.
    #[instrument(skip_all, fields(property = %property))]
    pub fn start(&mut self, property: PropertyId) {
        self.active = Some(property);
        self.local_only = false;
        self.warned_fallback = false;
        let ids: Vec<ClientId> = self.live_ids();
        for &id in &ids {
            if let Some(client) = self.clients.get_mut(&id) {
                client.samples.clear();
                client.queue(&ServerMessage::Start(property));
                client.touch();
            }
            self.flush(id);
        }
        debug!(workers = ids.len(), "sampling started");
    }

    /// Stops the active property: live workers are sent `STOP`, buffered
    /// observations are dropped and dead workers are forgotten.
    pub fn stop(&mut self) {
        let Some(property) = self.active.take() else {
            return;
        };
        if mem::take(&mut self.local_only) {
            debug!(%property, "local run stopped");
            return;
        }
        for id in self.live_ids() {
            if let Some(client) = self.clients.get_mut(&id) {
                client.queue(&ServerMessage::Stop);
            }
            self.flush(id);
        }
        for client in self.clients.values_mut() {
            client.samples.clear();
        }
        let dead: Vec<ClientId> = self
            .clients
            .values()
            .filter(|client| client.dead)
            .map(|client| client.id)
            .collect();
        for id in dead {
            self.remove_client(id);
        }
        debug!(%property, "sampling stopped");
    }

    /// Returns the next observation and the producer it came from.
    ///
    /// `simulate` produces a local observation when the local simulator is
    /// at the head of the schedule or no producer remains.
    pub fn next_sample(&mut self, simulate: &mut dyn FnMut() -> bool) -> (Producer, bool) {
        if self.local_only {
            return (Producer::Local, simulate());
        }

        // Pick up new workers and pending data without blocking.
        if let Err(e) = self.poll_once(Some(Duration::ZERO)) {
            warn!(error = %e, "poll failed");
        }

        loop {
            let Some(&producer) = self.schedule.front() else {
                if !self.warned_fallback {
                    warn!("no sampling producers left; simulating locally");
                    self.warned_fallback = true;
                }
                return (Producer::Local, simulate());
            };

            let id = match producer {
                Producer::Local => {
                    self.schedule.rotate_left(1);
                    return (Producer::Local, simulate());
                }
                Producer::Remote(id) => id,
            };

            match self.pending(id) {
                Pending::Ready(value) => {
                    self.schedule.rotate_left(1);
                    trace!(client = %id, value, "remote observation");
                    return (producer, value);
                }
                Pending::Wait(timeout) => {
                    if let Err(e) = self.poll_once(Some(timeout)) {
                        warn!(client = %id, error = %e, "poll failed while waiting for worker");
                        self.mark_dead(id);
                    }
                }
                Pending::Gone => {
                    self.schedule.pop_front();
                    self.remove_client(id);
                }
            }
        }
    }

    fn pending(&mut self, id: ClientId) -> Pending {
        let timeout = self.config.idle_timeout();
        let Some(client) = self.clients.get_mut(&id) else {
            return Pending::Gone;
        };
        if let Some(value) = client.samples.pop_front() {
            return Pending::Ready(value);
        }
        if client.dead {
            return Pending::Gone;
        }
        if client.is_idle(timeout) {
            warn!(client = %id, timeout_ms = self.config.idle_timeout_ms, "worker idle; dropping");
            self.mark_dead(id);
            return Pending::Gone;
        }
        Pending::Wait(client.idle_remaining(timeout))
    }

    // ========================================================================
    // Event loop
    // ========================================================================

    /// Waits up to `timeout` for socket readiness and handles every event.
    fn poll_once(&mut self, timeout: Option<Duration>) -> ServerResult<()> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        let ready: Vec<(Token, bool, bool)> = self
            .events
            .iter()
            .map(|event| {
                let readable = event.is_readable() || event.is_read_closed() || event.is_error();
                (event.token(), readable, event.is_writable())
            })
            .collect();

        for (token, readable, writable) in ready {
            if token == LISTENER_TOKEN {
                self.accept_clients();
            } else {
                self.handle_client_event(client_for(token), readable, writable);
            }
        }
        Ok(())
    }

    fn accept_clients(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    if self.clients.len() >= self.config.max_clients {
                        warn!(%addr, max_clients = self.config.max_clients, "rejecting worker");
                        continue;
                    }
                    self.register_client(stream, addr);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    return;
                }
            }
        }
    }

    fn register_client(&mut self, stream: TcpStream, addr: SocketAddr) {
        let id = self.next_id;
        self.next_id = id.next();
        let token = token_for(id);

        let mut client = ClientConnection::new(id, token, stream, self.config.read_buffer_size);
        client.queue(&ServerMessage::Register(id));
        if let Some(property) = self.active.filter(|_| !self.local_only) {
            client.queue(&ServerMessage::Start(property));
        }
        let interest = client.interest();
        if let Err(e) = self
            .poll
            .registry()
            .register(&mut client.stream, token, interest)
        {
            warn!(%addr, error = %e, "failed to register worker");
            return;
        }

        info!(client = %id, %addr, "worker connected");
        self.clients.insert(id, client);
        self.schedule.push_back(Producer::Remote(id));
        self.flush(id);
    }

    fn handle_client_event(&mut self, id: ClientId, readable: bool, writable: bool) {
        let active = self.active;
        let Some(client) = self.clients.get_mut(&id) else {
            return;
        };
        if client.dead {
            return;
        }

        let mut alive = true;
        if readable {
            match client.read() {
                Ok(open) => alive = open,
                Err(e) => {
                    debug!(client = %id, error = %e, "read failed");
                    alive = false;
                }
            }
            // Records that arrived before EOF still count.
            if let Err(e) = client.drain_records(active) {
                warn!(client = %id, error = %e, "protocol error");
                alive = false;
            }
        }
        if alive && (writable || !client.write_buf.is_empty()) {
            if let Err(e) = client.write() {
                debug!(client = %id, error = %e, "write failed");
                alive = false;
            }
        }

        if alive {
            let interest = client.interest();
            if let Err(e) = self
                .poll
                .registry()
                .reregister(&mut client.stream, client.token, interest)
            {
                warn!(client = %id, error = %e, "failed to reregister worker");
                self.mark_dead(id);
            }
        } else {
            self.mark_dead(id);
        }
    }

    /// Writes as much of the client's pending output as the socket accepts.
    fn flush(&mut self, id: ClientId) {
        let Some(client) = self.clients.get_mut(&id) else {
            return;
        };
        let result = client.write().and_then(|_| {
            let interest = client.interest();
            self.poll
                .registry()
                .reregister(&mut client.stream, client.token, interest)
        });
        if let Err(e) = result {
            debug!(client = %id, error = %e, "write failed");
            self.mark_dead(id);
        }
    }

    fn mark_dead(&mut self, id: ClientId) {
        let Some(client) = self.clients.get_mut(&id) else {
            return;
        };
        if client.dead {
            return;
        }
        client.dead = true;
        if let Err(e) = self.poll.registry().deregister(&mut client.stream) {
            debug!(client = %id, error = %e, "deregister failed");
        }
        warn!(client = %id, buffered = client.samples.len(), "worker disconnected");
    }

    fn remove_client(&mut self, id: ClientId) {
        self.schedule.retain(|producer| *producer != Producer::Remote(id));
        if self.clients.remove(&id).is_some() {
            info!(client = %id, "worker left the schedule");
        }
    }

    fn live_ids(&self) -> Vec<ClientId> {
        self.clients
            .values()
            .filter(|client| !client.dead)
            .map(|client| client.id)
            .collect()
    }
}

impl SampleSource for SamplingServer {
    fn begin(&mut self, property: PropertyId, state: &State) {
        let origin = self.origin.get_or_insert_with(|| state.values().to_vec());
        if origin.as_slice() == state.values() {
            self.start(property);
            return;
        }
        warn!(%property, %state, "run starts away from the workers' state; sampling locally");
        self.active = Some(property);
        self.local_only = true;
    }

    fn next_observation(&mut self, simulate: &mut dyn FnMut() -> bool) -> bool {
        self.next_sample(simulate).1
    }

    fn end(&mut self, _property: PropertyId) {
        self.stop();
    }
}
