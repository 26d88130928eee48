//! Hierarchical scope authorization.
//!
//! A caller's token carries a set of permission strings. A request names
//! zero or more scopes (`projects/acme/api`). Access is granted when any
//! requested scope, or any of its slash-delimited ancestors down to and
//! including the top-level segment, appears verbatim in the permission
//! set. The literal permission `admin` grants everything.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Permission that bypasses every scope check.
pub const ADMIN_SCOPE: &str = "admin";

/// Decoded, already-verified token claims.
///
/// An unauthenticated caller is represented by claims with an empty
/// `user_id` and the verifier's error in `token_error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userID", default)]
    pub user_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(rename = "tokenError", default)]
    pub token_error: String,
}

impl Claims {
    pub fn new(user_id: &str, email: &str, permissions: &[&str]) -> Self {
        Self {
            user_id: user_id.to_string(),
            email: email.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            token_error: String::new(),
        }
    }

    /// Claims for a request whose token was missing or rejected upstream.
    pub fn unauthenticated(reason: &str) -> Self {
        Self {
            token_error: reason.to_string(),
            ..Self::default()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !self.user_id.is_empty()
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// Authorization failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Token missing or invalid; carries the verifier's message verbatim.
    #[error("{0}")]
    Unauthenticated(String),

    /// Authenticated, but no requested scope matched.
    #[error("You don't have permission to access this resource")]
    PermissionDenied { user_id: String },
}

impl AuthError {
    /// The principal, when one was identified before the denial.
    pub fn principal(&self) -> Option<&str> {
        match self {
            AuthError::Unauthenticated(_) => None,
            AuthError::PermissionDenied { user_id } => Some(user_id),
        }
    }
}

/// Decides whether the caller may act on the requested scopes.
///
/// Returns the principal id on success.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, claims: &Claims, scopes: &[&str]) -> Result<String, AuthError>;
}

/// Production authorizer: admin override plus hierarchical scope walk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeAuthorizer;

impl Authorizer for ScopeAuthorizer {
    fn authorize(&self, claims: &Claims, scopes: &[&str]) -> Result<String, AuthError> {
        if !claims.is_authenticated() {
            return Err(AuthError::Unauthenticated(claims.token_error.clone()));
        }

        if claims.has_permission(ADMIN_SCOPE) || scopes.is_empty() {
            return Ok(claims.user_id.clone());
        }

        let granted = scopes
            .iter()
            .any(|scope| scope_prefixes(scope).any(|prefix| claims.has_permission(prefix)));

        if granted {
            Ok(claims.user_id.clone())
        } else {
            debug!(user = %claims.user_id, ?scopes, "scope check denied");
            Err(AuthError::PermissionDenied {
                user_id: claims.user_id.clone(),
            })
        }
    }
}

/// Authorizer that admits every caller. Intended for tests and tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, claims: &Claims, _scopes: &[&str]) -> Result<String, AuthError> {
        Ok(claims.user_id.clone())
    }
}

/// Walk a scope from most specific to the top-level segment.
///
/// `"projects/acme/api"` yields `"projects/acme/api"`, `"projects/acme"`,
/// `"projects"`.
pub fn scope_prefixes(scope: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(scope);
    std::iter::from_fn(move || {
        let current = next?;
        next = current.rfind('/').map(|idx| &current[..idx]);
        Some(current)
    })
}
