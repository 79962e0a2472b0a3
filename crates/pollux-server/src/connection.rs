//! Worker connection state.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use mio::net::TcpStream;
use mio::{Interest, Token};
use pollux_types::{ClientId, PropertyId};
use pollux_wire::{ClientMessage, ServerMessage};
use tracing::trace;

use crate::error::ServerResult;

/// State of a connected worker.
pub struct ClientConnection {
    pub id: ClientId,
    pub token: Token,
    pub stream: TcpStream,
    pub read_buf: BytesMut,
    pub write_buf: BytesMut,
    /// Observations received for the active property, in arrival order.
    pub samples: VecDeque<bool>,
    /// Set on EOF or any I/O or protocol error. Buffered samples are still
    /// consumed before the worker leaves the schedule.
    pub dead: bool,
    /// Last time the worker sent data or was sent `START`.
    pub last_activity: Instant,
}

impl ClientConnection {
    pub fn new(id: ClientId, token: Token, stream: TcpStream, buffer_size: usize) -> Self {
        Self {
            id,
            token,
            stream,
            read_buf: BytesMut::with_capacity(buffer_size),
            write_buf: BytesMut::with_capacity(buffer_size),
            samples: VecDeque::new(),
            dead: false,
            last_activity: Instant::now(),
        }
    }

    /// Updates the last activity timestamp.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Checks if the worker has been silent for longer than the timeout.
    pub fn is_idle(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }

    /// Time left before the worker counts as idle.
    pub fn idle_remaining(&self, timeout: Duration) -> Duration {
        timeout.saturating_sub(self.last_activity.elapsed())
    }

    /// Reads data from the socket into the read buffer.
    ///
    /// Returns `true` if the connection is still open.
    pub fn read(&mut self) -> io::Result<bool> {
        let mut temp_buf = [0u8; 4096];

        loop {
            match self.stream.read(&mut temp_buf) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.read_buf.extend_from_slice(&temp_buf[..n]);
                    self.touch();
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(true),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Writes data from the write buffer to the socket.
    ///
    /// Returns `true` if all data was written.
    pub fn write(&mut self) -> io::Result<bool> {
        while !self.write_buf.is_empty() {
            match self.stream.write(&self.write_buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write to socket",
                    ));
                }
                Ok(n) => {
                    let _ = self.write_buf.split_to(n);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    /// Decodes every complete record in the read buffer, keeping samples
    /// tagged with `active` and discarding the rest.
    pub fn drain_records(&mut self, active: Option<PropertyId>) -> ServerResult<()> {
        while let Some(ClientMessage::Sample { property, value }) =
            ClientMessage::decode(&mut self.read_buf)?
        {
            if Some(property) == active {
                self.samples.push_back(value != 0);
            } else {
                trace!(client = %self.id, %property, "discarding stale sample");
            }
        }
        Ok(())
    }

    /// Queues a record to be sent.
    pub fn queue(&mut self, message: &ServerMessage) {
        message.encode(&mut self.write_buf);
    }

    /// Returns the interest flags for this connection.
    pub fn interest(&self) -> Interest {
        if self.write_buf.is_empty() {
            Interest::READABLE
        } else {
            Interest::READABLE | Interest::WRITABLE
        }
    }
}
