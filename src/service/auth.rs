//! Credential login.

use std::sync::Arc;

use crate::auth::TokenService;
use crate::error::ServiceError;
use crate::observability::metrics;
use crate::service::types::{LoginResponse, UserResponse};
use crate::store::{CredentialHasher, IdentityStore};

/// Exchanges email and password for a bearer token.
///
/// Rate limiting happens before this is reached; see
/// [`login_rate_limit`](crate::security::rate_limit::login_rate_limit).
pub struct AuthService {
    users: Arc<dyn IdentityStore>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<TokenService>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn IdentityStore>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self { users, hasher, tokens }
    }

    /// Unknown email and wrong password fail identically.
    ///
    /// Blocking: password verification is CPU-bound.
    pub fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ServiceError> {
        tracing::info!(email = %email, "Login attempt");

        let Some(user) = self.users.find_by_email(email) else {
            tracing::warn!(email = %email, "Login failed: user not found");
            metrics::record_login("unknown_email");
            return Err(ServiceError::InvalidCredentials);
        };

        if !self.hasher.matches(password, &user.password_hash) {
            tracing::warn!(email = %email, "Login failed: invalid password");
            metrics::record_login("bad_password");
            return Err(ServiceError::InvalidCredentials);
        }

        let token = self.tokens.issue(&user.id, &user.email, user.role);

        tracing::info!(user_id = %user.id, role = %user.role, "Login successful");
        metrics::record_login("success");

        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            user: UserResponse::from(&user),
        })
    }
}
