//! Authentication gate.
//!
//! # Responsibilities
//! - Read the `Authorization: Bearer <token>` header
//! - Verify the token and confirm the subject still exists
//! - Publish a [`Principal`] into request extensions
//!
//! # Design Decisions
//! - Fail-open: a missing, garbled or expired token never aborts the
//!   request. Handlers that need identity use [`CurrentPrincipal::require`].
//! - No authorization rules live here; role checks happen in handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::auth::principal::{Principal, Role};
use crate::auth::token::{TokenError, TokenService};
use crate::error::ServiceError;
use crate::observability::metrics;
use crate::store::IdentityStore;

const BEARER_PREFIX: &str = "Bearer ";

/// Resolves request credentials to an identity.
#[derive(Clone)]
pub struct AuthGate {
    tokens: Arc<TokenService>,
    users: Arc<dyn IdentityStore>,
}

impl AuthGate {
    pub fn new(tokens: Arc<TokenService>, users: Arc<dyn IdentityStore>) -> Self {
        Self { tokens, users }
    }

    /// Identity for these headers, or `None` for anonymous requests.
    pub fn principal_for(&self, headers: &HeaderMap) -> Option<Principal> {
        let token = bearer_token(headers)?;

        let claims = match self.tokens.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                match e {
                    TokenError::Expired => tracing::debug!("Ignoring expired bearer token"),
                    _ => tracing::warn!(reason = e.as_str(), "Ignoring invalid bearer token"),
                }
                metrics::record_token_rejected(e.as_str());
                return None;
            }
        };

        if !self.users.exists_by_id(&claims.sub) {
            tracing::warn!(user_id = %claims.sub, "Token subject no longer exists");
            metrics::record_token_rejected("unknown_subject");
            return None;
        }

        Some(Principal::new(claims.sub, claims.role))
    }
}

/// Token portion of a bearer `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Middleware that attaches a [`Principal`] when the request carries a
/// valid token. Always forwards the request.
pub async fn authenticate(
    State(gate): State<AuthGate>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(principal) = gate.principal_for(request.headers()) {
        tracing::debug!(user_id = %principal.subject, role = %principal.role, "Authenticated request");
        request.extensions_mut().insert(principal);
    }
    next.run(request).await
}

/// Extractor for the identity published by [`authenticate`].
#[derive(Debug, Clone, Default)]
pub struct CurrentPrincipal(pub Option<Principal>);

impl CurrentPrincipal {
    pub fn get(&self) -> Option<&Principal> {
        self.0.as_ref()
    }

    pub fn require(self) -> Result<Principal, ServiceError> {
        self.0.ok_or(ServiceError::Unauthenticated)
    }

    pub fn require_role(self, role: Role) -> Result<Principal, ServiceError> {
        let principal = self.require()?;
        if principal.has_role(role) {
            Ok(principal)
        } else {
            tracing::warn!(user_id = %principal.subject, required = %role, "Access denied");
            Err(ServiceError::Forbidden)
        }
    }
}

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Principal>().cloned()))
    }
}
