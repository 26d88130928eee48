//! circuit-state: embedded state store for the Circuit control plane.
//!
//! Backed by [redb](https://docs.rs/redb). Every domain record is
//! JSON-serialized into a `&[u8]` value column keyed by its id. Reads
//! needed by the release pipeline are expressed as predicate filters and
//! creation-time ordering through the [`Repository`] trait, so the
//! pipeline never depends on a query language.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod repository;
pub mod snapshot;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use repository::{Record, Repository};
pub use snapshot::Snapshot;
pub use store::StateStore;
pub use types::*;
