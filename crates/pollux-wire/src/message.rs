use bytes::{Buf, BufMut, Bytes, BytesMut};
use pollux_types::{ClientId, PropertyId};

use crate::{WireError, WireResult};

/// Size of every record on the wire.
pub const RECORD_SIZE: usize = 16;

const TAG_REGISTER: u8 = 1;
const TAG_START: u8 = 2;
const TAG_STOP: u8 = 3;
const TAG_SAMPLE: u8 = 4;

/// Records sent by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMessage {
    /// Assigns the worker its ephemeral id.
    Register(ClientId),
    /// Asks the worker to start producing samples of a path property.
    Start(PropertyId),
    /// Asks the worker to stop producing samples.
    Stop,
}

/// Records sent by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    /// One observation of `property`.
    ///
    /// The property id lets the coordinator discard samples that were in
    /// flight when the property was stopped.
    Sample { property: PropertyId, value: i64 },
}

impl ClientMessage {
    /// A Bernoulli observation, encoded as 0 or 1.
    pub fn sample(property: PropertyId, holds: bool) -> Self {
        ClientMessage::Sample {
            property,
            value: i64::from(holds),
        }
    }
}

/// The common layout of both directions.
struct RawRecord {
    tag: u8,
    id: u32,
    value: i64,
}

impl RawRecord {
    fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(RECORD_SIZE);
        buf.put_u8(self.tag);
        buf.put_bytes(0, 3);
        buf.put_u32(self.id);
        buf.put_i64(self.value);
    }

    /// Splits one record off the front of `buf`, or returns `None` if fewer
    /// than [`RECORD_SIZE`] bytes are buffered.
    fn decode(buf: &mut BytesMut) -> Option<Self> {
        if buf.len() < RECORD_SIZE {
            return None;
        }
        let mut record = buf.split_to(RECORD_SIZE);
        let tag = record.get_u8();
        record.advance(3);
        let id = record.get_u32();
        let value = record.get_i64();
        Some(Self { tag, id, value })
    }
}

fn tag_name(tag: u8) -> WireResult<&'static str> {
    match tag {
        TAG_REGISTER => Ok("REGISTER"),
        TAG_START => Ok("START"),
        TAG_STOP => Ok("STOP"),
        TAG_SAMPLE => Ok("SAMPLE"),
        other => Err(WireError::UnknownTag(other)),
    }
}

impl ServerMessage {
    pub fn encode(&self, buf: &mut BytesMut) {
        let raw = match *self {
            ServerMessage::Register(id) => RawRecord {
                tag: TAG_REGISTER,
                id: id.into(),
                value: 0,
            },
            ServerMessage::Start(property) => RawRecord {
                tag: TAG_START,
                id: property.into(),
                value: 0,
            },
            ServerMessage::Stop => RawRecord {
                tag: TAG_STOP,
                id: 0,
                value: 0,
            },
        };
        raw.encode(buf);
    }

    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(RECORD_SIZE);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decodes the next record, consuming it from `buf`.
    ///
    /// Returns `Ok(None)` while the record is incomplete.
    pub fn decode(buf: &mut BytesMut) -> WireResult<Option<Self>> {
        let Some(raw) = RawRecord::decode(buf) else {
            return Ok(None);
        };
        match raw.tag {
            TAG_REGISTER => Ok(Some(ServerMessage::Register(ClientId::new(raw.id)))),
            TAG_START => Ok(Some(ServerMessage::Start(PropertyId::new(raw.id)))),
            TAG_STOP => Ok(Some(ServerMessage::Stop)),
            other => Err(WireError::UnexpectedRecord {
                tag: tag_name(other)?,
                expected: "coordinator record",
            }),
        }
    }
}

impl ClientMessage {
    pub fn encode(&self, buf: &mut BytesMut) {
        let ClientMessage::Sample { property, value } = *self;
        RawRecord {
            tag: TAG_SAMPLE,
            id: property.into(),
            value,
        }
        .encode(buf);
    }

    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(RECORD_SIZE);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decodes the next record, consuming it from `buf`.
    ///
    /// Returns `Ok(None)` while the record is incomplete.
    pub fn decode(buf: &mut BytesMut) -> WireResult<Option<Self>> {
        let Some(raw) = RawRecord::decode(buf) else {
            return Ok(None);
        };
        match raw.tag {
            TAG_SAMPLE => Ok(Some(ClientMessage::Sample {
                property: PropertyId::new(raw.id),
                value: raw.value,
            })),
            other => Err(WireError::UnexpectedRecord {
                tag: tag_name(other)?,
                expected: "SAMPLE",
            }),
        }
    }
}
