//! Release pipeline error types.

use circuit_core::{AuthError, EventError};
use circuit_state::StateError;
use thiserror::Error;

/// Errors that can occur while creating, dispatching or transitioning a release.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{entity} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("No services found")]
    NoServices,

    #[error("no project extensions found")]
    NoProjectExtensions,

    #[error("Project not allowed to create release in given environment")]
    EnvironmentNotAllowed,

    #[error("Found a waiting release with the same properties. Aborting.")]
    DuplicateInFlight { release_id: String },

    #[error("no env project branch found")]
    NoBranch,

    #[error("no release extensions found for release {release_id}")]
    NoReleaseExtensions { release_id: String },

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("state store error: {0}")]
    State(StateError),

    #[error("event bus error: {0}")]
    Publish(#[from] EventError),
}

impl ReleaseError {
    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        ReleaseError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Precondition failures: the request was well-formed but the release
    /// would have no well-defined outcome.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ReleaseError::NoServices
                | ReleaseError::NoProjectExtensions
                | ReleaseError::EnvironmentNotAllowed
                | ReleaseError::DuplicateInFlight { .. }
                | ReleaseError::NoBranch
                | ReleaseError::NoReleaseExtensions { .. }
        )
    }
}

impl From<StateError> for ReleaseError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::NotFound { kind, id } => ReleaseError::NotFound { entity: kind, id },
            other => ReleaseError::State(other),
        }
    }
}

pub type ReleaseResult<T> = Result<T, ReleaseError>;
