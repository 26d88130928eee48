//! Typed claims extractor.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use circuit_core::Claims;
use tracing::debug;

/// Header carrying the gateway-verified claims as JSON.
pub const CLAIMS_HEADER: &str = "x-circuit-claims";

/// Claims for the current request.
///
/// Never rejects: a missing or unreadable header yields unauthenticated
/// claims, and the authorizer turns those into a 401.
#[derive(Debug, Clone)]
pub struct AuthClaims(pub Claims);

impl<S: Send + Sync> FromRequestParts<S> for AuthClaims {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(CLAIMS_HEADER) else {
            return Ok(AuthClaims(Claims::unauthenticated("No JWT was provided")));
        };

        let claims = raw
            .to_str()
            .ok()
            .and_then(|s| serde_json::from_str::<Claims>(s).ok())
            .unwrap_or_else(|| {
                debug!("unreadable claims header");
                Claims::unauthenticated("invalid claims")
            });
        Ok(AuthClaims(claims))
    }
}
