//! Follower collection and batch runs
//!
//! `Collector` drives the cursor loop for one target, leasing an account from
//! the `Rotator` for every request. `Batch` runs the collector over a list of
//! targets one at a time, turns every per-target failure into a
//! `RunSummary`, and hands results to an `ArtifactSink`.
//!
//! Failure boundaries:
//! - account problems (rate limits, expired sessions) stay inside the rotator
//! - target problems (not found, retries exhausted) end that target only
//! - credential store I/O failures abort the whole batch

pub mod artifacts;
pub mod batch;
pub mod collector;
pub mod error;
pub mod summary;

pub use artifacts::{ArtifactSink, FileArtifacts};
pub use batch::{Batch, BatchReport};
pub use collector::{Collection, Collector, Harvest, Limit, Truncation};
pub use error::{ArtifactError, BatchError, CollectError};
pub use summary::{RunStatus, RunSummary};
