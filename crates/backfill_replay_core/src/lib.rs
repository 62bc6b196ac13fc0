//! Time-budgeted, resumable table scan and replay.
//!
//! This crate owns the checkpoint model, the page source adapter and the
//! bounded replay controller. It intentionally excludes AWS SDK and Lambda
//! runtime concerns; those live in `backfill_replay_lambda`.

pub mod budget;
pub mod config;
pub mod contract;
pub mod controller;
pub mod error;
pub mod page_source;
pub mod sink;
pub mod stream_event;
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use contract::{Checkpoint, Item, ReplayRequest, ReplayResponse, RunResult};
pub use controller::{CredentialProvider, ReplayController, RunReport};
pub use error::{ErrorKind, ReplayError};
