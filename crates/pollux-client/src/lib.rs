//! # pollux-client: Remote sampling worker for `Pollux`
//!
//! A [`SamplingWorker`] connects to a `pollux-server` coordinator and
//! contributes observations to whichever path property the coordinator is
//! currently testing. It holds its own copy of the model and property tree;
//! the coordinator only names properties by id.
//!
//! ## Usage
//!
//! ```ignore
//! use pollux_client::SamplingWorker;
//!
//! let paths = property.path_properties();
//! let mut worker = SamplingWorker::connect("127.0.0.1:5545")?;
//! worker.run(|id| {
//!     let path = paths.get(&id)?;
//!     Some(verifier.sample_path(path, &initial))
//! })?;
//! ```

mod error;
mod worker;

pub use error::{ClientError, ClientResult};
pub use worker::SamplingWorker;
