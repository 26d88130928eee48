//! circuit-api: REST API for the Circuit release pipeline.
//!
//! The token-verifying gateway in front of this service forwards the
//! caller's decoded claims; handlers receive them as a typed
//! [`AuthClaims`] extractor.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/releases` | Create (or roll back) a release |
//! | GET | `/api/v1/releases/{id}` | Get a release |
//! | POST | `/api/v1/releases/{id}/stop` | Cancel a release |

pub mod claims;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use circuit_release::ReleaseService;
use circuit_state::StateStore;

pub use claims::{AuthClaims, CLAIMS_HEADER};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub releases: Arc<ReleaseService<StateStore>>,
}

/// Build the API router.
pub fn build_router(releases: Arc<ReleaseService<StateStore>>) -> Router {
    let api_routes = Router::new()
        .route("/releases", post(handlers::create_release))
        .route("/releases/{id}", get(handlers::get_release))
        .route("/releases/{id}/stop", post(handlers::stop_release))
        .with_state(ApiState { releases });

    Router::new().nest("/api/v1", api_routes)
}
