//! AWS-oriented adapters and handlers for table backfill replay.
//!
//! This crate owns runtime integration details (Lambda handler, DynamoDB
//! scans, role assumption and downstream invocation) and plugs them into the
//! collaborator traits of `backfill_replay_core`.

pub mod adapters;
pub mod handlers;
pub mod logging;
