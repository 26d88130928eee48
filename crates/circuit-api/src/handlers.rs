//! REST API handlers.
//!
//! Each handler authorizes through the release service and returns the
//! uniform `{success, data?, error?}` envelope.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use circuit_core::AuthError;
use circuit_release::{CreateReleaseInput, ReleaseError};

use crate::ApiState;
use crate::claims::AuthClaims;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// HTTP status for a pipeline error.
pub fn status_for(err: &ReleaseError) -> StatusCode {
    match err {
        ReleaseError::Auth(AuthError::Unauthenticated(_)) => StatusCode::UNAUTHORIZED,
        ReleaseError::Auth(AuthError::PermissionDenied { .. }) => StatusCode::FORBIDDEN,
        ReleaseError::NotFound { .. } => StatusCode::NOT_FOUND,
        ReleaseError::DuplicateInFlight { .. } => StatusCode::CONFLICT,
        e if e.is_precondition() => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn release_error(err: ReleaseError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, "release request failed");
    }
    error_response(&err.to_string(), status).into_response()
}

// ── Releases ───────────────────────────────────────────────────

/// POST /api/v1/releases
pub async fn create_release(
    State(state): State<ApiState>,
    AuthClaims(claims): AuthClaims,
    Json(input): Json<CreateReleaseInput>,
) -> impl IntoResponse {
    match state.releases.create(&claims, input) {
        Ok(release) => (StatusCode::CREATED, ApiResponse::ok(release)).into_response(),
        Err(e) => release_error(e),
    }
}

/// GET /api/v1/releases/{id}
pub async fn get_release(
    State(state): State<ApiState>,
    AuthClaims(claims): AuthClaims,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.releases.get(&claims, &id) {
        Ok(release) => ApiResponse::ok(release).into_response(),
        Err(e) => release_error(e),
    }
}

/// POST /api/v1/releases/{id}/stop
pub async fn stop_release(
    State(state): State<ApiState>,
    AuthClaims(claims): AuthClaims,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.releases.stop(&claims, &id) {
        Ok(release) => ApiResponse::ok(release).into_response(),
        Err(e) => release_error(e),
    }
}
