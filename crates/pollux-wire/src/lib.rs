//! # pollux-wire: Distributed sampling protocol for `Pollux`
//!
//! Coordinator and workers exchange fixed-size records over a connected
//! TCP stream. Every record has the same layout, so a reader only needs to
//! wait for [`RECORD_SIZE`] bytes before decoding.
//!
//! ## Record Format
//!
//! ```text
//! ┌────────┬──────────┬──────────┬──────────┐
//! │ tag u8 │ pad (3B) │ id u32   │ value i64│
//! └────────┴──────────┴──────────┴──────────┘
//!     1B        3B         4B         8B       = 16 bytes, big-endian
//! ```
//!
//! | tag | direction | id | value |
//! |---|---|---|---|
//! | `REGISTER` | coordinator → worker | client id | 0 |
//! | `START` | coordinator → worker | property id | 0 |
//! | `STOP` | coordinator → worker | 0 | 0 |
//! | `SAMPLE` | worker → coordinator | property id | observation |
//!
//! ## Session
//!
//! ```text
//! worker                         coordinator
//!   │ ── connect ───────────────────▶ │
//!   │ ◀────────────── REGISTER(id) ── │
//!   │ ◀────────────── START(prop) ─── │
//!   │ ── SAMPLE(prop, v) ───────────▶ │  (repeated)
//!   │ ◀────────────── STOP ────────── │
//! ```

mod error;
mod message;

pub use error::{WireError, WireResult};
pub use message::{ClientMessage, RECORD_SIZE, ServerMessage};
