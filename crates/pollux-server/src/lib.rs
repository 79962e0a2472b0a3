//! # pollux-server: Distributed sampling coordinator for `Pollux`
//!
//! Lets remote workers contribute path observations to the threshold tests
//! of a running verification.
//!
//! ## Architecture
//!
//! The coordinator uses `mio` for non-blocking I/O with a poll-based event
//! loop driven from inside the engine's sampling loop: no threads, no async
//! runtime.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    SamplingServer                        │
//! │  ┌─────────────┐   ┌──────────────┐   ┌───────────────┐  │
//! │  │  Listener   │ → │   Workers    │ → │   Schedule    │  │
//! │  │  (TCP)      │   │ (mio poll)   │   │ (round-robin) │  │
//! │  └─────────────┘   └──────────────┘   └───────────────┘  │
//! │                                               ↓          │
//! │                              SampleSource → SamplingVerifier
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! On connect a worker receives `REGISTER(client_id)`, then
//! `START(property_id)` whenever a top-level threshold test begins (at once
//! if one is running). It answers with a stream of `SAMPLE(property_id,
//! value)` records until `STOP`. Samples tagged with a property other than
//! the active one are discarded.
//!
//! ## Usage
//!
//! ```ignore
//! use pollux_config::PolluxConfig;
//! use pollux_engine::SamplingVerifier;
//! use pollux_server::SamplingServer;
//!
//! let config = PolluxConfig::load()?;
//! let mut server = SamplingServer::bind(config.sampling)?;
//! server.wait_for_clients(4, Duration::from_secs(10))?;
//!
//! let mut verifier = SamplingVerifier::new(model, config.checking)?;
//! let holds = verifier.verify_with(&property, &initial, &mut server);
//! ```

mod connection;
mod error;
mod server;
#[cfg(test)]
mod tests;

pub use error::{ServerError, ServerResult};
pub use server::{Producer, SamplingServer};
