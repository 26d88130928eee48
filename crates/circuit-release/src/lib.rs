//! circuit-release: the release orchestration pipeline.
//!
//! Turns "release commit F of project P into environment E" into a
//! frozen, reproducible [`Release`](circuit_state::Release) and a single
//! dispatch event for the extension runtime.
//!
//! # Stages
//!
//! - **`gather`**: current services, secrets and complete extensions
//! - **`prepare`**: validation gates, duplicate detection, rollback reuse
//! - **`builder`**: tail-feature resolution and snapshotting
//! - **`compose`**: the outbound `release` event
//! - **`lifecycle`**: stop, start, complete, fail
//! - **`service`**: `ReleaseService`, the entry points that chain them

pub mod builder;
pub mod compose;
pub mod envvars;
pub mod error;
pub mod gather;
pub mod lifecycle;
pub mod prepare;
pub mod queue;
pub mod service;
pub mod signature;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::{ReleaseError, ReleaseResult};
pub use prepare::{PrepareRequest, ReleaseComponents};
pub use service::{CreateReleaseInput, ReleaseService};
