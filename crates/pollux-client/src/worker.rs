//! Blocking sampling worker.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use bytes::BytesMut;
use pollux_types::{ClientId, PropertyId};
use pollux_wire::{ClientMessage, RECORD_SIZE, ServerMessage};
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{ClientError, ClientResult};

/// A remote producer of path observations.
///
/// The worker blocks until the coordinator sends `START`, then streams one
/// `SAMPLE` per call to the sampler, checking for `STOP` between samples.
pub struct SamplingWorker {
    stream: TcpStream,
    id: ClientId,
    read_buf: BytesMut,
    write_buf: BytesMut,
    active: Option<PropertyId>,
}

impl SamplingWorker {
    /// Connects to a coordinator and waits for its `REGISTER` record.
    pub fn connect(addr: impl ToSocketAddrs + ToString) -> ClientResult<Self> {
        let stream = TcpStream::connect(&addr).map_err(|source| ClientError::Connect {
            addr: addr.to_string(),
            source,
        })?;
        stream.set_nodelay(true)?;

        let mut worker = Self {
            stream,
            id: ClientId::default(),
            read_buf: BytesMut::with_capacity(4 * RECORD_SIZE),
            write_buf: BytesMut::with_capacity(RECORD_SIZE),
            active: None,
        };
        match worker.recv()? {
            Some(ServerMessage::Register(id)) => worker.id = id,
            Some(other) => {
                return Err(ClientError::UnexpectedRecord(format!(
                    "expected REGISTER, got {other:?}"
                )));
            }
            None => return Err(ClientError::ConnectionClosed),
        }
        info!(client = %worker.id, "registered with coordinator");
        Ok(worker)
    }

    /// Id assigned by the coordinator.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Property currently being sampled.
    pub fn active_property(&self) -> Option<PropertyId> {
        self.active
    }

    /// Serves the coordinator until it closes the connection.
    ///
    /// `sampler` produces one observation of the given property, or `None`
    /// if the worker cannot evaluate it; the worker then sits out until the
    /// next `START`.
    #[instrument(skip_all, fields(client = %self.id))]
    pub fn run<F>(&mut self, mut sampler: F) -> ClientResult<()>
    where
        F: FnMut(PropertyId) -> Option<bool>,
    {
        let mut sent: u64 = 0;
        loop {
            let Some(property) = self.active else {
                match self.recv() {
                    Ok(Some(message)) => self.apply(message),
                    Ok(None) => break,
                    Err(e) => return closed_or(e),
                }
                continue;
            };

            if let Err(e) = self.poll_records() {
                return closed_or(e);
            }
            if self.active != Some(property) {
                continue;
            }

            let Some(value) = sampler(property) else {
                warn!(%property, "cannot sample property; waiting for the next START");
                self.active = None;
                continue;
            };
            if let Err(e) = self.send(ClientMessage::sample(property, value)) {
                return closed_or(e);
            }
            sent += 1;
        }
        info!(sent, "coordinator closed the connection");
        Ok(())
    }

    fn apply(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Register(id) => {
                debug!(client = %id, "re-registered");
                self.id = id;
            }
            ServerMessage::Start(property) => {
                debug!(%property, "start");
                self.active = Some(property);
            }
            ServerMessage::Stop => {
                debug!("stop");
                self.active = None;
            }
        }
    }

    /// Blocks until a full record arrives. Returns `None` on EOF.
    fn recv(&mut self) -> ClientResult<Option<ServerMessage>> {
        loop {
            if let Some(message) = ServerMessage::decode(&mut self.read_buf)? {
                trace!(?message, "received");
                return Ok(Some(message));
            }
            if !self.fill()? {
                return Ok(None);
            }
        }
    }

    /// Applies every record that is already readable without blocking.
    fn poll_records(&mut self) -> ClientResult<()> {
        self.stream.set_nonblocking(true)?;
        let filled = self.fill();
        self.stream.set_nonblocking(false)?;
        if !filled? {
            return Err(ClientError::ConnectionClosed);
        }
        while let Some(message) = ServerMessage::decode(&mut self.read_buf)? {
            self.apply(message);
        }
        Ok(())
    }

    /// Reads once into the buffer. Returns `false` on EOF.
    fn fill(&mut self) -> ClientResult<bool> {
        let mut temp_buf = [0u8; 1024];
        loop {
            match self.stream.read(&mut temp_buf) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.read_buf.extend_from_slice(&temp_buf[..n]);
                    return Ok(true);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(true),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn send(&mut self, message: ClientMessage) -> ClientResult<()> {
        message.encode(&mut self.write_buf);
        self.stream.write_all(&self.write_buf)?;
        self.write_buf.clear();
        Ok(())
    }
}

/// Treats the coordinator going away as a normal end of service.
fn closed_or(error: ClientError) -> ClientResult<()> {
    let closed = match &error {
        ClientError::ConnectionClosed => true,
        ClientError::Io(e) => matches!(
            e.kind(),
            io::ErrorKind::BrokenPipe
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    };
    if closed {
        info!("coordinator went away");
        Ok(())
    } else {
        Err(error)
    }
}
